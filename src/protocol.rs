//! ROT2Prog wire format.
//!
//! Commands from the host are always 13 bytes:
//!
//! ```text
//! | 0    | 1..=4      | 5  | 6..=9      | 10 | 11 | 12   |
//! | 0x57 | H (ASCII)  | PH | V (ASCII)  | PV | K  | 0x20 |
//! ```
//!
//! Responses from the controller are always 12 bytes:
//!
//! ```text
//! | 0    | 1..=4      | 5  | 6..=9      | 10 | 11   |
//! | 0x57 | H (values) | PH | V (values) | PV | 0x20 |
//! ```
//!
//! In a Set command H and V are pulse counts, `(angle + 360) * resolution`,
//! written as four ASCII digits. In a response the four bytes of each axis are
//! the hundreds, tens, units and tenths of `angle + 360`, as plain values 0-9.

/// Length of a command frame sent by the host.
pub const COMMAND_LEN: usize = 13;
/// Length of a response frame sent by the controller.
pub const RESPONSE_LEN: usize = 12;

/// A complete response frame.
pub type ResponseFrame = [u8; RESPONSE_LEN];

/// First byte of every frame ('W').
pub const START_MARKER: u8 = 0x57;
/// Last byte of every frame (' ').
pub const TERMINATOR: u8 = 0x20;

/// Command code for Stop.
pub const CMD_STOP: u8 = 0x0F;
/// Command code for Status.
pub const CMD_STATUS: u8 = 0x1F;
/// Command code for Set.
pub const CMD_SET: u8 = 0x2F;

const COMMAND_CODE_OFFSET: usize = 11;

/// Offset added to every angle before it goes on the wire.
const ANGLE_OFFSET: f64 = 360.0;

/// Controller resolution in pulses per degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// One pulse per degree.
    #[default]
    Degree = 1,
    /// Two pulses per degree.
    HalfDegree = 2,
    /// Four pulses per degree.
    QuarterDegree = 4,
}

impl Resolution {
    /// The resolution as the byte that goes in the PH/PV fields.
    pub fn pulses_per_degree(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Resolution {
    type Error = crate::Error;

    fn try_from(pulses: u8) -> Result<Self, Self::Error> {
        match pulses {
            1 => Ok(Resolution::Degree),
            2 => Ok(Resolution::HalfDegree),
            4 => Ok(Resolution::QuarterDegree),
            other => Err(crate::Error::InvalidResolution(other)),
        }
    }
}

/// A decoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stop,
    Status,
    /// Set position; `h` and `v` are the raw pulse counts from the frame.
    Set { h: i32, v: i32 },
    /// Any other command code.
    Invalid(u8),
}

impl Command {
    /// Builds a Set command pointing at `azimuth`/`elevation`, as a host would.
    pub fn set_position(azimuth: f64, elevation: f64, resolution: Resolution) -> Self {
        let ppd = f64::from(resolution.pulses_per_degree());
        Command::Set {
            h: ((azimuth + ANGLE_OFFSET) * ppd).round() as i32,
            v: ((elevation + ANGLE_OFFSET) * ppd).round() as i32,
        }
    }

    /// The K byte for this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::Stop => CMD_STOP,
            Command::Status => CMD_STATUS,
            Command::Set { .. } => CMD_SET,
            Command::Invalid(code) => *code,
        }
    }
}

/// Classifies a complete command frame by its K byte.
pub fn decode_command(frame: &[u8; COMMAND_LEN]) -> Command {
    match frame[COMMAND_CODE_OFFSET] {
        CMD_STOP => Command::Stop,
        CMD_STATUS => Command::Status,
        CMD_SET => Command::Set {
            h: decode_pulses(&frame[1..5]),
            v: decode_pulses(&frame[6..10]),
        },
        code => Command::Invalid(code),
    }
}

/// Reads four ASCII digits as a decimal number.
///
/// Bytes are not range checked: each one contributes `byte - '0'`, so a
/// non-digit byte yields an out-of-range (possibly negative) pulse count
/// rather than an error.
fn decode_pulses(digits: &[u8]) -> i32 {
    digits
        .iter()
        .fold(0, |acc, &b| acc * 10 + (i32::from(b) - i32::from(b'0')))
}

/// Converts a pulse count to degrees, rounded to one decimal place.
pub fn pulses_to_degrees(pulses: i32, resolution: Resolution) -> f64 {
    round_tenth(f64::from(pulses) / f64::from(resolution.pulses_per_degree()) - ANGLE_OFFSET)
}

/// Rounds to one decimal place, ties to even.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// The four response digits for one axis.
///
/// These are the hundreds, tens, units and tenths of `degrees + 360` after
/// rounding to 0.1. Values of 1000 or more keep only their last four digits,
/// the same way the controller drops the thousands place. Negative sums wrap
/// modulo 1000.0.
pub fn axis_digits(degrees: f64) -> [u8; 4] {
    let tenths = ((degrees + ANGLE_OFFSET) * 10.0).round_ties_even() as i64;
    let tenths = tenths.rem_euclid(10_000);
    [
        (tenths / 1000 % 10) as u8,
        (tenths / 100 % 10) as u8,
        (tenths / 10 % 10) as u8,
        (tenths % 10) as u8,
    ]
}

/// Whether `degrees` can be reported without wrapping.
pub fn in_reportable_range(degrees: f64) -> bool {
    let shifted = round_tenth(degrees + ANGLE_OFFSET);
    (0.0..1000.0).contains(&shifted)
}

/// Builds the response frame for the given position.
pub fn encode_response(azimuth: f64, elevation: f64, resolution: Resolution) -> ResponseFrame {
    let ppd = resolution.pulses_per_degree();
    let h = axis_digits(azimuth);
    let v = axis_digits(elevation);
    [
        START_MARKER, h[0], h[1], h[2], h[3], ppd, v[0], v[1], v[2], v[3], ppd, TERMINATOR,
    ]
}

/// Builds a command frame as a host would send it.
///
/// Pulse counts are written as four ASCII digits; counts outside 0..=9999
/// are clamped.
pub fn encode_command(command: Command, resolution: Resolution) -> [u8; COMMAND_LEN] {
    let ppd = resolution.pulses_per_degree();
    let (h, v) = match command {
        Command::Set { h, v } => (h, v),
        _ => (0, 0),
    };
    let h = ascii_digits(h);
    let v = ascii_digits(v);
    [
        START_MARKER,
        h[0],
        h[1],
        h[2],
        h[3],
        ppd,
        v[0],
        v[1],
        v[2],
        v[3],
        ppd,
        command.code(),
        TERMINATOR,
    ]
}

fn ascii_digits(pulses: i32) -> [u8; 4] {
    let n = pulses.clamp(0, 9999);
    [
        b'0' + (n / 1000 % 10) as u8,
        b'0' + (n / 100 % 10) as u8,
        b'0' + (n / 10 % 10) as u8,
        b'0' + (n % 10) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_RESOLUTIONS: [Resolution; 3] = [
        Resolution::Degree,
        Resolution::HalfDegree,
        Resolution::QuarterDegree,
    ];

    fn set_frame(h: &[u8; 4], v: &[u8; 4]) -> [u8; COMMAND_LEN] {
        let mut frame = [START_MARKER, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, CMD_SET, TERMINATOR];
        frame[1..5].copy_from_slice(h);
        frame[6..10].copy_from_slice(v);
        frame
    }

    #[test]
    fn resolution_from_pulses() {
        assert_eq!(Resolution::try_from(1).unwrap(), Resolution::Degree);
        assert_eq!(Resolution::try_from(2).unwrap(), Resolution::HalfDegree);
        assert_eq!(Resolution::try_from(4).unwrap(), Resolution::QuarterDegree);
        assert!(matches!(
            Resolution::try_from(3),
            Err(crate::Error::InvalidResolution(3))
        ));
        assert!(matches!(
            Resolution::try_from(0),
            Err(crate::Error::InvalidResolution(0))
        ));
    }

    #[test]
    fn decode_stop_and_status() {
        let mut frame = encode_command(Command::Stop, Resolution::Degree);
        assert_eq!(decode_command(&frame), Command::Stop);
        frame[11] = CMD_STATUS;
        assert_eq!(decode_command(&frame), Command::Status);
    }

    #[test]
    fn decode_set_reads_ascii_digits() {
        let frame = set_frame(b"3600", b"0721");
        assert_eq!(decode_command(&frame), Command::Set { h: 3600, v: 721 });
    }

    #[test]
    fn decode_unknown_code_is_invalid() {
        let mut frame = encode_command(Command::Status, Resolution::Degree);
        frame[11] = 0xFF;
        assert_eq!(decode_command(&frame), Command::Invalid(0xFF));
        frame[11] = 0x00;
        assert_eq!(decode_command(&frame), Command::Invalid(0x00));
    }

    #[test]
    fn decode_non_digit_bytes_without_panicking() {
        // ' ' is 0x20, i.e. -16 once '0' is subtracted.
        let frame = set_frame(b"   0", b"9999");
        assert_eq!(
            decode_command(&frame),
            Command::Set { h: -16 * 1000 - 16 * 100 - 16 * 10, v: 9999 }
        );
    }

    #[test]
    fn pulses_to_degrees_per_resolution() {
        assert_eq!(pulses_to_degrees(360, Resolution::Degree), 0.0);
        assert_eq!(pulses_to_degrees(3600, Resolution::Degree), 3240.0);
        assert_eq!(pulses_to_degrees(0, Resolution::Degree), -360.0);
        assert_eq!(pulses_to_degrees(721, Resolution::HalfDegree), 0.5);
        assert_eq!(pulses_to_degrees(1440, Resolution::QuarterDegree), 0.0);
        assert_eq!(pulses_to_degrees(2160, Resolution::QuarterDegree), 180.0);
    }

    #[test]
    fn quarter_degrees_round_half_to_even() {
        assert_eq!(pulses_to_degrees(1441, Resolution::QuarterDegree), 0.2);
        assert_eq!(pulses_to_degrees(1443, Resolution::QuarterDegree), 0.8);
        assert_eq!(pulses_to_degrees(1439, Resolution::QuarterDegree), -0.2);
        assert_eq!(pulses_to_degrees(1, Resolution::QuarterDegree), -359.8);
    }

    #[test]
    fn axis_digits_worked_example() {
        assert_eq!(axis_digits(0.0), [3, 6, 0, 0]);
    }

    #[test]
    fn axis_digits_near_lower_bound() {
        assert_eq!(axis_digits(-360.0), [0, 0, 0, 0]);
        assert_eq!(axis_digits(-359.9), [0, 0, 0, 1]);
        assert_eq!(axis_digits(-355.5), [0, 0, 4, 5]);
        assert_eq!(axis_digits(-350.0), [0, 1, 0, 0]);
        assert_eq!(axis_digits(-260.2), [0, 9, 9, 8]);
    }

    #[test]
    fn axis_digits_near_upper_bound() {
        assert_eq!(axis_digits(359.9), [7, 1, 9, 9]);
        assert_eq!(axis_digits(360.0), [7, 2, 0, 0]);
        assert_eq!(axis_digits(639.9), [9, 9, 9, 9]);
        // 1000.0 only keeps its last four digits.
        assert_eq!(axis_digits(640.0), [0, 0, 0, 0]);
        assert_eq!(axis_digits(652.3), [0, 1, 2, 3]);
        assert_eq!(axis_digits(3240.0), [6, 0, 0, 0]);
    }

    #[test]
    fn axis_digits_rounds_to_tenths() {
        assert_eq!(axis_digits(10.25), [3, 7, 0, 2]);
        assert_eq!(axis_digits(10.75), [3, 7, 0, 8]);
        assert_eq!(axis_digits(0.1 + 0.2), [3, 6, 0, 3]);
    }

    #[test]
    fn axis_digits_wraps_negative_sums() {
        assert_eq!(axis_digits(-360.5), [9, 9, 9, 5]);
        assert!(!in_reportable_range(-360.5));
        assert!(!in_reportable_range(640.0));
        assert!(in_reportable_range(-360.0));
        assert!(in_reportable_range(639.9));
    }

    #[test]
    fn encode_response_at_origin() {
        assert_eq!(
            encode_response(0.0, 0.0, Resolution::Degree),
            [0x57, 3, 6, 0, 0, 1, 3, 6, 0, 0, 1, 0x20]
        );
    }

    #[test]
    fn encode_response_carries_resolution() {
        assert_eq!(
            encode_response(123.4, -45.6, Resolution::QuarterDegree),
            [0x57, 4, 8, 3, 4, 4, 3, 1, 4, 4, 4, 0x20]
        );
    }

    #[test]
    fn encode_set_command_frame() {
        let frame = encode_command(
            Command::set_position(0.0, 0.0, Resolution::Degree),
            Resolution::Degree,
        );
        assert_eq!(&frame, b"W0360\x010360\x01\x2f ");

        let frame = encode_command(
            Command::set_position(10.5, -20.25, Resolution::QuarterDegree),
            Resolution::QuarterDegree,
        );
        assert_eq!(&frame[1..5], b"1482");
        assert_eq!(&frame[6..10], b"1359");
        assert_eq!(frame[5], 4);
        assert_eq!(frame[10], 4);
    }

    #[test]
    fn set_frames_decode_back_to_grid_angles() {
        for resolution in ALL_RESOLUTIONS {
            let ppd = i32::from(resolution.pulses_per_degree());
            for step in (-360 * ppd)..(360 * ppd) {
                // Elevation walks the same grid backwards.
                let azimuth = f64::from(step) / f64::from(ppd);
                let elevation = f64::from(-step - 1) / f64::from(ppd);
                let command = Command::set_position(azimuth, elevation, resolution);
                let frame = encode_command(command, resolution);
                let Command::Set { h, v } = decode_command(&frame) else {
                    panic!("expected a Set command");
                };
                assert_eq!(
                    pulses_to_degrees(h, resolution),
                    round_tenth(azimuth),
                    "{resolution:?} azimuth {azimuth}"
                );
                assert_eq!(
                    pulses_to_degrees(v, resolution),
                    round_tenth(elevation),
                    "{resolution:?} elevation {elevation}"
                );
            }
        }
    }
}

//! # ROT2Prog Simulator Library
//!
//! This library contains the core logic for simulating a ROT2Prog
//! azimuth/elevation rotator controller. It keeps the current pointing of the
//! simulated rotator and processes binary command frames against it,
//! returning response frames byte-for-byte like the real controller.
//!
//! [`Simulator`] is the pure protocol state machine. [`Session`] runs it on a
//! worker thread against a serial port (or any `Read + Write` transport).

pub mod error;
pub mod monitor;
pub mod observer;
pub mod protocol;
pub mod session;

pub use error::{Error, FrameError, Result};
pub use observer::{Observer, TracingObserver};
pub use protocol::{Command, Resolution, ResponseFrame, COMMAND_LEN, RESPONSE_LEN};
pub use session::{Session, SimulatorConfig, Snapshot};

/// The pointing state of the simulated rotator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatorState {
    /// Azimuth in degrees.
    pub azimuth: f64,
    /// Elevation in degrees.
    pub elevation: f64,
    pub resolution: Resolution,
}

impl RotatorState {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            azimuth: 0.0,
            elevation: 0.0,
            resolution,
        }
    }
}

/// What a complete command frame decoded to, and the reply it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub command: Command,
    /// The response to write back; `None` for Set.
    pub response: Option<ResponseFrame>,
}

// The protocol state machine of the simulated controller.
#[derive(Debug, Clone)]
pub struct Simulator {
    state: RotatorState,
}

impl Simulator {
    /// Creates a new `Simulator` pointing at 0°/0° with the given resolution.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            state: RotatorState::new(resolution),
        }
    }

    /// The current pointing state.
    pub fn state(&self) -> &RotatorState {
        &self.state
    }

    /// Processes a raw command frame and returns the decoded command along
    /// with the response, if any.
    ///
    /// Anything other than exactly [`COMMAND_LEN`] bytes is an incomplete
    /// frame and leaves the state untouched.
    pub fn process_frame(&mut self, frame: &[u8]) -> std::result::Result<Reply, FrameError> {
        let frame: &[u8; COMMAND_LEN] = frame
            .try_into()
            .map_err(|_| FrameError::Incomplete(frame.len()))?;
        let command = protocol::decode_command(frame);
        let response = self.execute(command)?;
        Ok(Reply { command, response })
    }

    /// Executes a decoded command.
    ///
    /// Set moves the rotator and is silent. Stop and Status report the
    /// current position. Since the simulated rotator never moves on its own,
    /// Stop has nothing to halt.
    pub fn execute(&mut self, command: Command) -> std::result::Result<Option<ResponseFrame>, FrameError> {
        match command {
            Command::Stop | Command::Status => Ok(Some(protocol::encode_response(
                self.state.azimuth,
                self.state.elevation,
                self.state.resolution,
            ))),
            Command::Set { h, v } => {
                self.state.azimuth = protocol::pulses_to_degrees(h, self.state.resolution);
                self.state.elevation = protocol::pulses_to_degrees(v, self.state.resolution);
                Ok(None)
            }
            Command::Invalid(code) => Err(FrameError::InvalidCommand(code)),
        }
    }
}

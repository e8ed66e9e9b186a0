//! Error types for the simulator.
//!
//! [`Error`] covers everything that can stop a session from starting or
//! keep its worker from running. [`FrameError`] covers a single bad command
//! frame; those are always recovered from inside the service loop.

/// Errors raised while configuring, opening or running a session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial port could not be opened or configured.
    #[error("failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// The configured resolution is not one the controller supports.
    #[error("unsupported resolution: {0} pulses per degree (expected 1, 2 or 4)")]
    InvalidResolution(u8),

    /// The transport reached end-of-stream while the session was running.
    #[error("transport closed")]
    TransportClosed,

    /// The worker thread panicked before it could report a result.
    #[error("simulator worker panicked")]
    WorkerPanicked,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors for a single command frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer than 13 bytes arrived before the line went idle.
    #[error("incomplete command packet ({0} of 13 bytes)")]
    Incomplete(usize),

    /// The command byte is not Stop, Status or Set.
    #[error("invalid command received (K = {0:#04x})")]
    InvalidCommand(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_error_messages() {
        assert_eq!(
            FrameError::Incomplete(5).to_string(),
            "incomplete command packet (5 of 13 bytes)"
        );
        assert_eq!(
            FrameError::InvalidCommand(0xFF).to_string(),
            "invalid command received (K = 0xff)"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}

//! Observability hooks for the service loop.
//!
//! The loop reports what it sees through an [`Observer`] so the codec and
//! the [`Simulator`](crate::Simulator) never log on their own. The default,
//! [`TracingObserver`], turns each event into a `tracing` record.

use crate::protocol::{in_reportable_range, Command, ResponseFrame};
use crate::RotatorState;

/// Receives protocol events from a running session.
///
/// Every method has an empty default so implementors only override what
/// they care about.
pub trait Observer: Send {
    /// A read cycle returned `bytes` (complete or not).
    fn frame_received(&mut self, _bytes: &[u8]) {}

    /// Fewer than a full frame arrived before the line went idle.
    fn incomplete_frame(&mut self, _bytes: &[u8]) {}

    /// The command byte was not recognised.
    fn invalid_command(&mut self, _code: u8) {}

    /// A Set command moved the rotator to `state`.
    fn position_set(&mut self, _state: &RotatorState) {}

    /// A Stop or Status command was answered with `response`.
    fn response_sent(&mut self, _command: Command, _state: &RotatorState, _response: &ResponseFrame) {}
}

/// Logs protocol events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    port: String,
}

impl TracingObserver {
    pub fn new(port: impl Into<String>) -> Self {
        Self { port: port.into() }
    }
}

impl Observer for TracingObserver {
    fn frame_received(&mut self, bytes: &[u8]) {
        tracing::debug!(port = %self.port, "Command packet received: {:02X?}", bytes);
    }

    fn incomplete_frame(&mut self, bytes: &[u8]) {
        tracing::error!(port = %self.port, len = bytes.len(), "Incomplete command packet");
    }

    fn invalid_command(&mut self, code: u8) {
        tracing::error!(port = %self.port, "Invalid command received (K = {:#04x})", code);
    }

    fn position_set(&mut self, state: &RotatorState) {
        tracing::debug!(
            port = %self.port,
            azimuth = state.azimuth,
            elevation = state.elevation,
            "Set command received"
        );
        if !in_reportable_range(state.azimuth) || !in_reportable_range(state.elevation) {
            tracing::warn!(
                port = %self.port,
                azimuth = state.azimuth,
                elevation = state.elevation,
                "Position outside the reportable range, status digits will wrap"
            );
        }
    }

    fn response_sent(&mut self, command: Command, state: &RotatorState, response: &ResponseFrame) {
        tracing::debug!(
            port = %self.port,
            command = ?command,
            azimuth = state.azimuth,
            elevation = state.elevation,
            pulses_per_degree = state.resolution.pulses_per_degree(),
            "Response packet sent: {:02X?}",
            response
        );
    }
}

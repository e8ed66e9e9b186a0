//! Running a [`Simulator`] against a byte-stream transport.
//!
//! A [`Session`] owns one worker thread. The worker reads one command frame
//! per iteration, feeds it to the simulator and writes back any response.
//! The rotator state belongs to the worker alone; callers only ever see a
//! published [`Snapshot`].
//!
//! Stopping is cooperative. [`Session::stop`] sets a flag that the worker
//! checks between reads, so shutdown waits for the current read to finish
//! (at most one inter-byte timeout once the line is quiet).

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::{Error, FrameError, Result};
use crate::observer::{Observer, TracingObserver};
use crate::protocol::{Command, Resolution, COMMAND_LEN};
use crate::{Reply, RotatorState, Simulator};

/// Baud rate of the ROT2Prog serial link.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How long the line may stay quiet inside a frame before it counts as torn.
pub const DEFAULT_INTER_BYTE_TIMEOUT: Duration = Duration::from_millis(100);

/// Settings for a simulator session on a serial port.
///
/// The link is always 8 data bits, no parity, 1 stop bit and no flow
/// control; only the rate and timeout are adjustable.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    pub port: String,
    pub resolution: Resolution,
    pub baud_rate: u32,
    pub inter_byte_timeout: Duration,
}

impl SimulatorConfig {
    /// Creates a config with default link settings, validating the resolution.
    pub fn new(port: impl Into<String>, pulses_per_degree: u8) -> Result<Self> {
        Ok(Self {
            port: port.into(),
            resolution: Resolution::try_from(pulses_per_degree)?,
            baud_rate: DEFAULT_BAUD_RATE,
            inter_byte_timeout: DEFAULT_INTER_BYTE_TIMEOUT,
        })
    }

    /// Opens and configures the serial port.
    pub fn open_port(&self) -> Result<Box<dyn SerialPort>> {
        tracing::debug!(
            port = %self.port,
            baud_rate = self.baud_rate,
            timeout_ms = self.inter_byte_timeout.as_millis() as u64,
            "Opening serial port"
        );
        serialport::new(&self.port, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.inter_byte_timeout)
            .open()
            .map_err(|source| {
                tracing::error!(port = %self.port, error = %source, "Failed to open serial port");
                Error::Open {
                    port: self.port.clone(),
                    source,
                }
            })
    }
}

/// A copy of the worker's state, published after every read cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub state: RotatorState,
    /// The most recent complete command.
    pub last_command: Option<Command>,
    /// Read cycles that returned at least one byte.
    pub frames_received: u64,
    pub responses_sent: u64,
    pub incomplete_frames: u64,
    pub invalid_commands: u64,
}

impl Snapshot {
    fn new(state: RotatorState) -> Self {
        Self {
            state,
            last_command: None,
            frames_received: 0,
            responses_sent: 0,
            incomplete_frames: 0,
            invalid_commands: 0,
        }
    }
}

/// Result of one read cycle.
#[derive(Debug, PartialEq)]
enum FrameRead {
    Complete([u8; COMMAND_LEN]),
    /// Some bytes arrived, then the line went idle.
    Incomplete(Vec<u8>),
    /// Nothing arrived before the timeout.
    Idle,
    /// End of stream.
    Closed,
}

/// Reads one command frame.
///
/// The transport is expected to time out reads once the line has been quiet
/// for the inter-byte timeout, which is what `serialport` does with
/// `timeout()` set.
fn read_frame<T: Read>(transport: &mut T) -> io::Result<FrameRead> {
    let mut buf = [0u8; COMMAND_LEN];
    let mut filled = 0;
    while filled < COMMAND_LEN {
        match transport.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(FrameRead::Closed),
            Ok(0) => return Ok(FrameRead::Incomplete(buf[..filled].to_vec())),
            Ok(n) => filled += n,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                return Ok(if filled == 0 {
                    FrameRead::Idle
                } else {
                    FrameRead::Incomplete(buf[..filled].to_vec())
                });
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(FrameRead::Complete(buf))
}

struct Worker<T, O> {
    transport: T,
    simulator: Simulator,
    observer: O,
    stop: Arc<AtomicBool>,
    shared: Arc<RwLock<Snapshot>>,
    snapshot: Snapshot,
}

impl<T: Read + Write, O: Observer> Worker<T, O> {
    fn run(mut self) -> Result<()> {
        while !self.stop.load(Ordering::Acquire) {
            match read_frame(&mut self.transport)? {
                FrameRead::Idle => continue,
                FrameRead::Closed => return Err(Error::TransportClosed),
                FrameRead::Incomplete(bytes) => self.handle_frame(&bytes)?,
                FrameRead::Complete(frame) => self.handle_frame(&frame)?,
            }
            self.publish();
        }
        Ok(())
    }

    fn handle_frame(&mut self, bytes: &[u8]) -> Result<()> {
        self.snapshot.frames_received += 1;
        self.observer.frame_received(bytes);
        match self.simulator.process_frame(bytes) {
            Ok(Reply { command, response }) => {
                self.snapshot.last_command = Some(command);
                match response {
                    Some(response) => {
                        self.transport.write_all(&response)?;
                        self.transport.flush()?;
                        self.snapshot.responses_sent += 1;
                        self.observer
                            .response_sent(command, self.simulator.state(), &response);
                    }
                    None => self.observer.position_set(self.simulator.state()),
                }
            }
            Err(err) => self.reject(&err, bytes),
        }
        Ok(())
    }

    fn reject(&mut self, err: &FrameError, bytes: &[u8]) {
        match err {
            FrameError::Incomplete(_) => {
                self.snapshot.incomplete_frames += 1;
                self.observer.incomplete_frame(bytes);
            }
            FrameError::InvalidCommand(code) => {
                self.snapshot.last_command = Some(Command::Invalid(*code));
                self.snapshot.invalid_commands += 1;
                self.observer.invalid_command(*code);
            }
        }
    }

    fn publish(&mut self) {
        self.snapshot.state = *self.simulator.state();
        *self.shared.write().unwrap_or_else(PoisonError::into_inner) = self.snapshot;
    }
}

/// A running simulator.
///
/// The worker starts as soon as the session is created. Dropping the session
/// requests a stop but does not wait for it; use [`Session::join`] for that.
#[derive(Debug)]
pub struct Session {
    stop: Arc<AtomicBool>,
    snapshot: Arc<RwLock<Snapshot>>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl Session {
    /// Opens the configured serial port and starts the simulator on it.
    ///
    /// Fails if the port cannot be opened; no worker is started in that case.
    pub fn open(config: &SimulatorConfig) -> Result<Self> {
        let port = config.open_port()?;
        tracing::info!(
            port = %config.port,
            "ROT2Prog simulation interface opened on {}",
            config.port
        );
        Self::spawn(port, config.resolution, TracingObserver::new(config.port.as_str()))
    }

    /// Starts the simulator on an already open transport.
    pub fn spawn<T, O>(transport: T, resolution: Resolution, observer: O) -> Result<Self>
    where
        T: Read + Write + Send + 'static,
        O: Observer + 'static,
    {
        let simulator = Simulator::new(resolution);
        let snapshot = Snapshot::new(*simulator.state());
        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(RwLock::new(snapshot));

        let worker = Worker {
            transport,
            simulator,
            observer,
            stop: Arc::clone(&stop),
            shared: Arc::clone(&shared),
            snapshot,
        };

        let handle = thread::Builder::new()
            .name("rot2prog-sim".into())
            .spawn(move || {
                let result = worker.run();
                match &result {
                    Ok(()) => tracing::info!("Simulator stopped"),
                    Err(e) => tracing::error!(error = %e, "Simulator worker failed"),
                }
                result
            })?;

        tracing::info!(
            pulses_per_degree = resolution.pulses_per_degree(),
            "Simulator started"
        );

        Ok(Self {
            stop,
            snapshot: shared,
            worker: Some(handle),
        })
    }

    /// Asks the worker to stop at the next iteration boundary. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// The most recently published state.
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until `quit` fires or the worker stops on its own.
    ///
    /// Returns `true` when the caller asked to quit (or dropped the sender)
    /// and `false` when the worker ended first, e.g. because the port went
    /// away. `poll` bounds how long a dead worker goes unnoticed.
    pub fn wait_for_quit(&self, quit: &Receiver<()>, poll: Duration) -> bool {
        while self.is_running() {
            match quit.recv_timeout(poll) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        false
    }

    /// Waits for the worker to finish and returns how it ended.
    ///
    /// This does not request a stop by itself.
    pub fn join(mut self) -> Result<()> {
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

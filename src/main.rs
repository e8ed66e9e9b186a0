use std::fs::File;
use std::io::{self, Write};
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rot2prog_sim::{monitor, Session, SimulatorConfig};
use tracing_subscriber::EnvFilter;

// How often the stdin wait checks whether the worker is still alive.
const QUIT_POLL: Duration = Duration::from_millis(200);

/// ROT2Prog rotator controller simulator.
#[derive(Parser)]
#[command(name = "rot2prog_sim_cli", version, about)]
struct Cli {
    /// Default log level when RUST_LOG is not set.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List available serial ports.
    List,
    /// Run the simulator on a serial port.
    Run {
        /// Serial port path (e.g. /dev/ttyUSB0, COM3). Prompts when omitted.
        #[arg(long)]
        port: Option<String>,

        /// Resolution in pulses per degree: 1, 2 or 4.
        #[arg(long, default_value_t = 1)]
        resolution: u8,

        /// Inter-byte timeout in milliseconds.
        #[arg(long, default_value_t = 100)]
        timeout_ms: u64,

        /// Show a live dashboard instead of waiting for Enter.
        #[arg(long)]
        monitor: bool,
    },
}

// The main entry point for the command-line simulator application.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let monitor = matches!(cli.command, CliCommand::Run { monitor: true, .. });
    init_logging(&cli.log_level, cli.log_file.as_deref(), monitor)?;

    match cli.command {
        CliCommand::List => list_ports(),
        CliCommand::Run {
            port,
            resolution,
            timeout_ms,
            monitor,
        } => {
            let port = match port {
                Some(port) => port,
                None => prompt_for_port()?,
            };
            let mut config = SimulatorConfig::new(port, resolution)?;
            config.inter_byte_timeout = Duration::from_millis(timeout_ms);
            run_simulator(&config, monitor)
        }
    }
}

// Logs go to a file when asked, and are dropped while the dashboard owns the
// terminal.
fn init_logging(level: &str, log_file: Option<&str>, monitor: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create log file '{path}'"))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None if monitor => builder.with_writer(io::sink).init(),
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("could not enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    println!("Available serial ports:");
    for port in ports {
        println!("  {}", port.port_name);
    }
    Ok(())
}

// Lists the serial ports and asks which one to use.
fn prompt_for_port() -> Result<String> {
    let ports = serialport::available_ports().context("could not enumerate serial ports")?;
    if ports.is_empty() {
        bail!("no serial ports found");
    }

    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {}", i, port.port_name);
    }

    print!("Select a port (number): ");
    io::stdout().flush()?;
    let mut choice = String::new();
    io::stdin().read_line(&mut choice)?;
    match choice.trim().parse::<usize>() {
        Ok(i) if i < ports.len() => Ok(ports[i].port_name.clone()),
        _ => bail!("invalid port selection '{}'", choice.trim()),
    }
}

fn run_simulator(config: &SimulatorConfig, monitor: bool) -> Result<()> {
    let session = Session::open(config)?;

    if monitor {
        monitor::run(&session, &config.port).context("monitor failed")?;
    } else {
        println!(
            "Simulating ROT2Prog on {} at {} pulses/degree. Press Enter to stop.",
            config.port,
            config.resolution.pulses_per_degree()
        );
        let (quit_tx, quit) = mpsc::channel();
        thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().read_line(&mut line);
            let _ = quit_tx.send(());
        });
        if !session.wait_for_quit(&quit, QUIT_POLL) {
            eprintln!("[ERROR] Simulator stopped unexpectedly.");
        }
    }

    session.stop();
    session.join()?;
    Ok(())
}

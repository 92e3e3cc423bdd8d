use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use usbnow_session::{DeviceAddress, Session, SessionConfig};
use usbnow_transport::{SerialTransport, TransportConfig};

use crate::exit::{session_error, transport_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod info;
pub mod monitor;
pub mod peers;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports,
    /// Initialize the device and print its version, address and peer count.
    Info(InfoArgs),
    /// Print received radio data until Ctrl-C.
    Monitor(MonitorArgs),
    /// Send one radio payload.
    Send(SendArgs),
    /// Manage the device peer table.
    Peers(PeersArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Serial link settings shared by every subcommand that opens a port.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub baud_rate: u32,
    pub timeout: Duration,
}

pub fn run(command: Command, link: Link, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports => ports::run(format),
        Command::Info(args) => info::run(args, link, format),
        Command::Monitor(args) => monitor::run(args, link, format),
        Command::Send(args) => send::run(args, link, format),
        Command::Peers(args) => peers::run(args, link, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Serial port of the dongle.
    #[arg(env = "USBNOW_PORT")]
    pub port: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial port of the dongle.
    #[arg(env = "USBNOW_PORT")]
    pub port: String,
    /// Radix used to print received bytes.
    #[arg(
        long,
        short = 'b',
        default_value = "16",
        value_parser = clap::value_parser!(u32).range(2..=36)
    )]
    pub base: u32,
    /// Exit after receiving N payloads.
    #[arg(long)]
    pub count: Option<usize>,
    /// Also print send-completion notifications.
    #[arg(long)]
    pub send_status: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial port of the dongle.
    #[arg(env = "USBNOW_PORT")]
    pub port: String,
    /// Destination address (AA:BB:CC:DD:EE:FF).
    #[arg(long)]
    pub to: String,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex payload (e.g. "48 65 6c 6c 6f").
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Wi-Fi channel used when registering the peer.
    #[arg(long, short = 'c', default_value = "0")]
    pub channel: u8,
    /// Register the destination as a peer first if it is not known.
    #[arg(long)]
    pub add_peer: bool,
    /// Wait for the radio send-completion notification and report it.
    #[arg(long)]
    pub wait_status: bool,
}

#[derive(Args, Debug)]
pub struct PeersArgs {
    /// Serial port of the dongle.
    #[arg(env = "USBNOW_PORT")]
    pub port: String,
    #[command(subcommand)]
    pub action: PeersAction,
}

#[derive(Subcommand, Debug)]
pub enum PeersAction {
    /// List the peer table.
    List,
    /// Add a peer, or update it when already present.
    Add {
        address: String,
        #[arg(long, short = 'c', default_value = "0")]
        channel: u8,
        #[arg(long)]
        encrypt: bool,
    },
    /// Remove a peer.
    Del { address: String },
    /// Add or update every peer in a JSON file.
    Load { file: PathBuf },
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open `port` and start a session with the link settings.
pub fn open_session(port: &str, link: Link) -> CliResult<Session<SerialTransport>> {
    let transport = SerialTransport::open_port(
        port,
        TransportConfig {
            baud_rate: link.baud_rate,
            timeout: link.timeout,
        },
    )
    .map_err(|err| transport_error("open failed", err))?;

    let config = SessionConfig {
        timeout: link.timeout,
        ..SessionConfig::default()
    };
    Session::open(transport, config).map_err(|err| session_error("open failed", err))
}

/// Open a session and initialize ESP-NOW on the device.
pub fn open_initialized(port: &str, link: Link) -> CliResult<Session<SerialTransport>> {
    let session = open_session(port, link)?;
    session
        .init()
        .map_err(|err| session_error("init failed", err))?;
    Ok(session)
}

pub fn parse_address(input: &str) -> CliResult<DeviceAddress> {
    input
        .parse()
        .map_err(|err| session_error("bad address", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, Link};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "usbnow", version, about = "USB-Now ESP-NOW dongle CLI")]
struct Cli {
    /// Serial baud rate.
    #[arg(long, env = "USBNOW_BAUD", default_value = "115200", global = true)]
    baud: u32,

    /// Per-command reply timeout (e.g. 500ms, 2s).
    #[arg(long, default_value = "1s", global = true)]
    timeout: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::parse_duration(&cli.timeout).and_then(|timeout| {
        let link = Link {
            baud_rate: cli.baud,
            timeout,
        };
        cmd::run(cli.command, link, format)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

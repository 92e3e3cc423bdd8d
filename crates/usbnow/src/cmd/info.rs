use serde::Serialize;
use usbnow_session::DeviceAddress;

use crate::cmd::{open_initialized, InfoArgs, Link};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    port: String,
    version: u32,
    address: DeviceAddress,
    peer_count: i32,
}

pub fn run(args: InfoArgs, link: Link, format: OutputFormat) -> CliResult<i32> {
    let session = open_initialized(&args.port, link)?;

    let out = InfoOutput {
        port: args.port.clone(),
        version: session
            .get_version()
            .map_err(|err| session_error("version query failed", err))?,
        address: session
            .get_device_address()
            .map_err(|err| session_error("address query failed", err))?,
        peer_count: session
            .get_peer_count()
            .map_err(|err| session_error("peer count query failed", err))?,
    };

    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "VERSION", "ADDRESS", "PEERS"]);
            table.add_row(vec![
                out.port.clone(),
                out.version.to_string(),
                out.address.to_string(),
                out.peer_count.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Device Info:");
            println!("  Port:     {}", out.port);
            println!("  Version:  {}", out.version);
            println!("  Address:  {}", out.address);
            println!("  Peers:    {}", out.peer_count);
        }
        OutputFormat::Raw => println!("{}", out.address),
    }
}

use serde::Serialize;

use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct PortsOutput {
    ports: Vec<String>,
}

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let ports =
        usbnow_transport::list_ports().map_err(|err| transport_error("port scan failed", err))?;

    match format {
        OutputFormat::Json => print_json(&PortsOutput { ports }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT"]);
            for port in &ports {
                table.add_row(vec![port.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("No serial ports found");
            } else {
                println!("Available ports:");
                for port in &ports {
                    println!("  {port}");
                }
            }
        }
        OutputFormat::Raw => {
            for port in &ports {
                println!("{port}");
            }
        }
    }

    Ok(SUCCESS)
}

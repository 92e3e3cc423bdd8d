use std::fs;
use std::sync::mpsc;

use serde::Serialize;
use usbnow_session::{DeviceAddress, PeerRecord, SendStatus, Session};
use usbnow_transport::SerialTransport;

use crate::cmd::{open_initialized, parse_address, Link, SendArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{new_table, print_json, status_label, OutputFormat};

#[derive(Serialize)]
struct SendOutput {
    to: DeviceAddress,
    size: usize,
    status: Option<SendStatus>,
}

pub fn run(args: SendArgs, link: Link, format: OutputFormat) -> CliResult<i32> {
    let to = parse_address(&args.to)?;
    let payload = resolve_payload(&args)?;

    let session = open_initialized(&args.port, link)?;
    if args.add_peer {
        ensure_peer(&session, to, args.channel)?;
    }

    let (tx, rx) = mpsc::channel();
    if args.wait_status {
        session.set_send_handler(move |dest, status| {
            if dest == to {
                let _ = tx.send(status);
            }
        });
    }

    session
        .send(to, &payload)
        .map_err(|err| session_error("send failed", err))?;

    let status = if args.wait_status {
        let status = rx.recv_timeout(link.timeout).map_err(|_| {
            CliError::new(
                TIMEOUT,
                format!("no send status from device within {:?}", link.timeout),
            )
        })?;
        Some(status)
    } else {
        None
    };

    print_result(
        &SendOutput {
            to,
            size: payload.len(),
            status,
        },
        format,
    );

    match status {
        Some(SendStatus::Failure) => Ok(FAILURE),
        _ => Ok(SUCCESS),
    }
}

fn ensure_peer(
    session: &Session<SerialTransport>,
    to: DeviceAddress,
    channel: u8,
) -> CliResult<()> {
    let peer =
        PeerRecord::new(to, channel, false).map_err(|err| session_error("bad peer", err))?;
    let known = session
        .is_peer_exist(to)
        .map_err(|err| session_error("peer lookup failed", err))?;
    if !known {
        session
            .add_peer(&peer)
            .map_err(|err| session_error("add peer failed", err))?;
    }
    Ok(())
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::usage("one of --data, --hex or --file is required"))
}

/// Hex digits, optionally separated by whitespace, `:` or `-`.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(CliError::usage(format!(
            "--hex needs an even, non-zero number of digits: {input}"
        )));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|text| u8::from_str_radix(text, 16).ok())
                .filter(|_| pair.iter().all(u8::is_ascii_hexdigit))
                .ok_or_else(|| CliError::usage(format!("--hex is not valid hex: {input}")))
        })
        .collect()
}

fn print_result(out: &SendOutput, format: OutputFormat) {
    let status = out.status.map_or("queued", status_label);
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["TO", "SIZE", "STATUS"]);
            table.add_row(vec![
                out.to.to_string(),
                out.size.to_string(),
                status.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("[{}] {} bytes {}", out.to, out.size, status),
        OutputFormat::Raw => println!("{status}"),
    }
}

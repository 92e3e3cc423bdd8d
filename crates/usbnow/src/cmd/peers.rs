use serde::Serialize;
use tracing::{debug, info};
use usbnow_session::{PeerList, PeerRecord, Session, SessionError};
use usbnow_transport::SerialTransport;

use crate::cmd::{open_initialized, parse_address, Link, PeersAction, PeersArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct LoadOutput {
    added: usize,
    updated: usize,
}

pub fn run(args: PeersArgs, link: Link, format: OutputFormat) -> CliResult<i32> {
    // Read the peer file before touching the device.
    let list = match &args.action {
        PeersAction::Load { file } => Some(PeerList::load(file).map_err(|err| match err {
            SessionError::Io(err) => io_error(&format!("failed reading {}", file.display()), err),
            other => CliError::new(DATA_INVALID, format!("{}: {other}", file.display())),
        })?),
        _ => None,
    };

    let session = open_initialized(&args.port, link)?;

    match args.action {
        PeersAction::List => {
            let peers = list_peers(&session)?;
            print_peers(&peers, format);
        }
        PeersAction::Add {
            address,
            channel,
            encrypt,
        } => {
            let address = parse_address(&address)?;
            let peer = PeerRecord::new(address, channel, encrypt)
                .map_err(|err| session_error("bad peer", err))?;
            let added = upsert(&session, &peer)?;
            print_peers(std::slice::from_ref(&peer), format);
            info!(%address, added, "peer stored");
        }
        PeersAction::Del { address } => {
            let address = parse_address(&address)?;
            session
                .del_peer(address)
                .map_err(|err| session_error("delete peer failed", err))?;
            info!(%address, "peer removed");
        }
        PeersAction::Load { .. } => {
            let mut out = LoadOutput {
                added: 0,
                updated: 0,
            };
            for peer in list.iter().flat_map(PeerList::iter) {
                if upsert(&session, peer)? {
                    out.added += 1;
                } else {
                    out.updated += 1;
                }
            }
            print_load(&out, format);
        }
    }

    Ok(SUCCESS)
}

/// Add `peer`, or modify it when the device already knows the address.
/// Returns true when the peer was new.
fn upsert(session: &Session<SerialTransport>, peer: &PeerRecord) -> CliResult<bool> {
    let known = session
        .is_peer_exist(peer.address)
        .map_err(|err| session_error("peer lookup failed", err))?;
    if known {
        session
            .mod_peer(peer)
            .map_err(|err| session_error("modify peer failed", err))?;
    } else {
        session
            .add_peer(peer)
            .map_err(|err| session_error("add peer failed", err))?;
    }
    Ok(!known)
}

/// Walk the device peer table with FETCH_PEER.
fn list_peers(session: &Session<SerialTransport>) -> CliResult<Vec<PeerRecord>> {
    let count = session
        .get_peer_count()
        .map_err(|err| session_error("peer count query failed", err))?;
    let count = usize::try_from(count).unwrap_or(0);

    let mut peers = Vec::with_capacity(count);
    while peers.len() < count {
        match session.fetch_peer(peers.is_empty()) {
            Ok(peer) => peers.push(peer),
            // The firmware reports the end of the table as an error.
            Err(SessionError::Device(message)) => {
                debug!(%message, fetched = peers.len(), "peer table ended early");
                break;
            }
            Err(err) => return Err(session_error("fetch peer failed", err)),
        }
    }
    Ok(peers)
}

fn print_peers(peers: &[PeerRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&peers),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ADDRESS", "CHANNEL", "ENCRYPT"]);
            for peer in peers {
                table.add_row(vec![
                    peer.address.to_string(),
                    peer.channel.to_string(),
                    peer.encrypt.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for peer in peers {
                let encrypt = if peer.encrypt { " (encrypted)" } else { "" };
                println!("{}  channel {}{}", peer.address, peer.channel, encrypt);
            }
        }
        OutputFormat::Raw => {
            for peer in peers {
                println!("{}", peer.address);
            }
        }
    }
}

fn print_load(out: &LoadOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ADDED", "UPDATED"]);
            table.add_row(vec![out.added.to_string(), out.updated.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{} added, {} updated", out.added, out.updated),
        OutputFormat::Raw => println!("{}", out.added + out.updated),
    }
}

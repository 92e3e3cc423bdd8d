use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cmd::{open_initialized, Link, MonitorArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_event, Event, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, link: Link, format: OutputFormat) -> CliResult<i32> {
    let session = open_initialized(&args.port, link)?;

    let version = session
        .get_version()
        .map_err(|err| session_error("version query failed", err))?;
    let address = session
        .get_device_address()
        .map_err(|err| session_error("address query failed", err))?;
    info!(port = %args.port, version, %address, "monitoring");
    if matches!(format, OutputFormat::Pretty) {
        println!("Version: {version}");
        println!("Address: {address}");
    }

    let (tx, rx) = mpsc::channel();
    let events = tx.clone();
    session.set_receive_handler(move |source, data| {
        let _ = events.send(Event::Received { source, data });
    });
    if args.send_status {
        session.set_send_handler(move |dest, status| {
            let _ = tx.send(Event::Sent { dest, status });
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0usize;
    let mut outcome = Ok(SUCCESS);
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                print_event(&event, args.base, format);
                if let Event::Received { .. } = event {
                    received = received.saturating_add(1);
                    if args.count.is_some_and(|count| received >= count) {
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if session.is_closed() {
                    outcome = Err(CliError::new(TRANSPORT_ERROR, "device disconnected"));
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.clear_receive_handler();
    session.clear_send_handler();
    if outcome.is_ok() {
        if let Err(err) = session.deinit() {
            warn!(error = %err, "deinit failed");
        }
    }
    let stats = session.stats();
    info!(
        received,
        frames = stats.frames,
        dropped = stats.dropped(),
        "monitor stopped"
    );
    if let Err(err) = session.close() {
        warn!(error = %err, "close failed");
    }
    outcome
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

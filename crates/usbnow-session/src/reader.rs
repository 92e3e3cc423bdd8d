use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use usbnow_frame::{FrameConfig, FrameReader};
use usbnow_transport::Transport;

use crate::dispatch::{lock, Dispatcher};

/// Spawn the single reader thread driving bytes → frames → dispatch.
///
/// The thread exits when `running` is cleared or the transport fails. However
/// it exits, the dispatcher is shut down so pending and later waits see
/// `ChannelClosed`.
pub(crate) fn spawn_reader<T: Transport + 'static>(
    transport: Arc<Mutex<T>>,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
    frame_config: FrameConfig,
    idle_backoff: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("usbnow-reader".to_string())
        .spawn(move || {
            let _shutdown = ShutdownOnExit(Arc::clone(&dispatcher));
            let mut reader = FrameReader::with_config(frame_config);
            let mut frames = Vec::new();

            while running.load(Ordering::Acquire) {
                let polled = {
                    let mut transport = lock(&transport);
                    reader.poll(&mut *transport, &mut frames)
                };

                match polled {
                    Ok(0) => {
                        thread::sleep(idle_backoff);
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        if running.load(Ordering::Acquire) {
                            warn!(error = %err, "transport read failed, closing session");
                        }
                        break;
                    }
                }

                dispatcher.record_deframer(reader.stats());
                for frame in frames.drain(..) {
                    dispatcher.dispatch(frame);
                }
            }
            debug!("reader thread stopped");
        })
}

/// Shuts the dispatcher down when the reader thread exits, including by panic.
struct ShutdownOnExit(Arc<Dispatcher>);

impl Drop for ShutdownOnExit {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_is_shut_down_when_thread_panics() {
        let dispatcher = Arc::new(Dispatcher::new());
        let rx = dispatcher.arm().unwrap();

        let handle = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                let _shutdown = ShutdownOnExit(dispatcher);
                panic!("reader failure");
            })
        };
        assert!(handle.join().is_err());

        assert!(dispatcher.is_closed());
        assert!(matches!(rx.try_recv(), Ok(crate::dispatch::Completion::Closed)));
    }
}

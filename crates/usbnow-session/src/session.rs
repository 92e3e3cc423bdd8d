use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};
use usbnow_frame::{response_name, Frame, FrameConfig, FrameWriter, DEFAULT_MAX_FRAME_LEN};
use usbnow_transport::Transport;

use crate::address::DeviceAddress;
use crate::command::Command;
use crate::dispatch::{lock, Completion, Dispatcher, SendStatus, SessionStats};
use crate::error::{Result, SessionError};
use crate::peer::PeerRecord;
use crate::reader::spawn_reader;
use crate::response;

/// Default wait for a command's terminal response.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Default reader sleep when the transport has nothing to read.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wait for `OK`/`ERROR` after each command. Default: 1s.
    pub timeout: Duration,
    /// Reader sleep between empty polls. Default: 1ms.
    pub idle_backoff: Duration,
    /// Bytes pulled from the transport per poll. Default: 256.
    pub read_chunk_size: usize,
    /// Maximum frame body length in either direction. Default: 2048.
    pub max_frame_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            read_chunk_size: 256,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl SessionConfig {
    fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_len: self.max_frame_len,
            read_chunk_size: self.read_chunk_size,
        }
    }
}

/// A live connection to a USB-Now device.
///
/// Commands may be issued from any thread; only one is on the wire at a
/// time and the others block until it completes. Notifications are delivered
/// to the registered handlers on the reader thread. Handlers must return
/// quickly and must not issue commands: the reply could never be dispatched
/// while the handler is running, so such a command always times out.
pub struct Session<T: Transport + 'static> {
    transport: Arc<Mutex<T>>,
    dispatcher: Arc<Dispatcher>,
    writer: Mutex<FrameWriter>,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    config: SessionConfig,
    name: String,
}

impl<T: Transport + 'static> Session<T> {
    /// Open `transport` (if needed) and start the reader thread.
    pub fn open(mut transport: T, config: SessionConfig) -> Result<Self> {
        if !transport.is_open() {
            transport.open()?;
        }
        let name = transport.name().to_string();

        let transport = Arc::new(Mutex::new(transport));
        let dispatcher = Arc::new(Dispatcher::new());
        let running = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(
            Arc::clone(&transport),
            Arc::clone(&dispatcher),
            Arc::clone(&running),
            config.frame_config(),
            config.idle_backoff,
        )?;

        info!(transport = %name, timeout = ?config.timeout, "session opened");
        Ok(Self {
            transport,
            dispatcher,
            writer: Mutex::new(FrameWriter::with_config(config.frame_config())),
            running,
            reader: Mutex::new(Some(reader)),
            config,
            name,
        })
    }

    /// Open with default configuration.
    pub fn with_defaults(transport: T) -> Result<Self> {
        Self::open(transport, SessionConfig::default())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Transport name the session was opened on.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    /// Initialize ESP-NOW on the device.
    pub fn init(&self) -> Result<()> {
        self.execute(Command::Init).map(drop)
    }

    /// Deinitialize ESP-NOW on the device.
    pub fn deinit(&self) -> Result<()> {
        self.execute(Command::Deinit).map(drop)
    }

    /// ESP-NOW protocol version reported by the device.
    pub fn get_version(&self) -> Result<u32> {
        let frame = self.query(Command::GetVersion)?;
        response::decode_version(&frame.payload)
    }

    /// Queue `data` (1..=250 bytes) for transmission to `peer`.
    ///
    /// Success means the device accepted the frame; the radio outcome arrives
    /// later through the send handler.
    pub fn send(&self, peer: DeviceAddress, data: &[u8]) -> Result<()> {
        self.execute(Command::Send { to: peer, data }).map(drop)
    }

    pub fn add_peer(&self, peer: &PeerRecord) -> Result<()> {
        self.execute(Command::AddPeer(*peer)).map(drop)
    }

    pub fn mod_peer(&self, peer: &PeerRecord) -> Result<()> {
        self.execute(Command::ModPeer(*peer)).map(drop)
    }

    pub fn del_peer(&self, peer: DeviceAddress) -> Result<()> {
        self.execute(Command::DelPeer(peer)).map(drop)
    }

    /// Set the ESP-NOW PHY rate for a Wi-Fi interface.
    pub fn config_rate(&self, interface: u8, rate: u8) -> Result<()> {
        self.execute(Command::ConfigRate { interface, rate }).map(drop)
    }

    pub fn get_peer(&self, peer: DeviceAddress) -> Result<PeerRecord> {
        let frame = self.query(Command::GetPeer(peer))?;
        response::decode_peer(&frame.payload)
    }

    /// Walk the peer table; `from_head` restarts at the first entry.
    pub fn fetch_peer(&self, from_head: bool) -> Result<PeerRecord> {
        let frame = self.query(Command::FetchPeer { from_head })?;
        response::decode_peer(&frame.payload)
    }

    pub fn is_peer_exist(&self, peer: DeviceAddress) -> Result<bool> {
        let frame = self.query(Command::IsPeerExist(peer))?;
        response::decode_peer_exist(&frame.payload)
    }

    pub fn get_peer_count(&self) -> Result<i32> {
        let frame = self.query(Command::GetPeerCount)?;
        response::decode_peer_count(&frame.payload)
    }

    /// Set the 16-byte primary master key.
    pub fn set_pmk(&self, key: &[u8]) -> Result<()> {
        self.execute(Command::SetPmk(key)).map(drop)
    }

    /// Set the wake window in milliseconds.
    pub fn set_wake_window(&self, window_ms: u16) -> Result<()> {
        self.execute(Command::SetWakeWindow(window_ms)).map(drop)
    }

    pub fn get_device_address(&self) -> Result<DeviceAddress> {
        let frame = self.query(Command::GetDeviceAddress)?;
        response::decode_address(&frame.payload)
    }

    /// Register the handler for incoming radio data, replacing any previous one.
    pub fn set_receive_handler<F>(&self, handler: F)
    where
        F: Fn(DeviceAddress, Bytes) + Send + Sync + 'static,
    {
        self.dispatcher.set_receive_handler(Some(Arc::new(handler)));
    }

    pub fn clear_receive_handler(&self) {
        self.dispatcher.set_receive_handler(None);
    }

    /// Register the handler for send completions, replacing any previous one.
    pub fn set_send_handler<F>(&self, handler: F)
    where
        F: Fn(DeviceAddress, SendStatus) + Send + Sync + 'static,
    {
        self.dispatcher.set_send_handler(Some(Arc::new(handler)));
    }

    pub fn clear_send_handler(&self) {
        self.dispatcher.set_send_handler(None);
    }

    /// Traffic counters, including frames dropped by the deframer.
    pub fn stats(&self) -> SessionStats {
        self.dispatcher.stats()
    }

    /// Stop the reader, fail any pending command and close the transport.
    ///
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.dispatcher.shutdown();

        if let Some(handle) = lock(&self.reader).take() {
            if handle.join().is_err() {
                warn!("reader thread panicked");
            }
        }
        self.dispatcher.clear_results();

        let result = lock(&self.transport).close();
        info!(transport = %self.name, "session closed");
        result.map_err(SessionError::from)
    }

    /// Issue a command that expects an informational reply before `OK`.
    fn query(&self, command: Command<'_>) -> Result<Frame> {
        let name = command.opcode().name();
        self.execute(command)?.ok_or_else(|| {
            SessionError::Protocol(format!("{name} completed without a reply"))
        })
    }

    /// One send-wait cycle. The writer lock is held for the whole cycle so
    /// exactly one command is in flight.
    fn execute(&self, command: Command<'_>) -> Result<Option<Frame>> {
        command.validate()?;
        let opcode = command.opcode();
        let payload = command.payload();

        let mut writer = lock(&self.writer);
        let rx = self.dispatcher.arm()?;
        {
            let mut transport = lock(&self.transport);
            if let Err(err) = writer.send(&mut *transport, opcode.code(), &payload) {
                self.dispatcher.disarm();
                return Err(err.into());
            }
        }
        debug!(command = opcode.name(), len = payload.len(), "command sent");

        let completion = match rx.recv_timeout(self.config.timeout) {
            Ok(completion) => completion,
            Err(RecvTimeoutError::Timeout) => {
                self.dispatcher.disarm();
                // The terminal may have raced the timeout.
                match rx.try_recv() {
                    Ok(completion) => completion,
                    Err(_) => {
                        warn!(
                            command = opcode.name(),
                            timeout = ?self.config.timeout,
                            "command timed out"
                        );
                        return Err(SessionError::Timeout(self.config.timeout));
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Err(SessionError::ChannelClosed),
        };

        match completion {
            Completion::Ok => {}
            Completion::Device(message) => return Err(SessionError::Device(message)),
            Completion::Protocol(message) => {
                // Keep the writer lock until any trailing terminal is absorbed.
                self.dispatcher.await_trailer(self.config.timeout);
                return Err(SessionError::Protocol(format!(
                    "{}: {message}",
                    opcode.name()
                )));
            }
            Completion::Closed => return Err(SessionError::ChannelClosed),
        }

        let Some(expected) = command.expected_reply() else {
            return Ok(None);
        };
        let frame = self.dispatcher.pop_result().ok_or_else(|| {
            SessionError::Protocol(format!(
                "{} acknowledged without a {} reply",
                opcode.name(),
                expected.name()
            ))
        })?;
        if frame.opcode != expected.code() {
            return Err(SessionError::Protocol(format!(
                "{} expected a {} reply, got {}",
                opcode.name(),
                expected.name(),
                response_name(frame.opcode)
            )));
        }
        Ok(Some(frame))
    }
}

impl<T: Transport + 'static> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(error = %err, "error closing session on drop");
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.name)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};
use usbnow_frame::{response_name, DeframerStats, Frame, ResponseOpcode};

use crate::address::{DeviceAddress, ADDRESS_LEN};
use crate::error::{Result, SessionError};
use crate::ring::ResultRing;

/// Handler for `RECV_CB` notifications: source address and radio payload.
pub type ReceiveHandler = Arc<dyn Fn(DeviceAddress, Bytes) + Send + Sync>;

/// Handler for `SEND_CB` notifications: destination address and outcome.
pub type SendHandler = Arc<dyn Fn(DeviceAddress, SendStatus) + Send + Sync>;

/// Outcome of a radio transmission reported by `SEND_CB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Success,
    Failure,
}

impl SendStatus {
    /// `0` is success; the firmware uses any other value for failure.
    pub fn from_byte(status: u8) -> Self {
        if status == 0 {
            SendStatus::Success
        } else {
            SendStatus::Failure
        }
    }

    pub fn is_success(self) -> bool {
        self == SendStatus::Success
    }
}

/// Counters describing traffic seen by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames that passed checksum validation.
    pub frames: u64,
    pub checksum_mismatch: u64,
    pub malformed_escape: u64,
    pub too_short: u64,
    pub overflow: u64,
    /// `OK`/`ERROR` frames that arrived with no command waiting.
    pub late_terminals: u64,
    /// Notifications too short to carry an address (and status).
    pub malformed_notifications: u64,
    /// Handler calls that panicked.
    pub handler_panics: u64,
}

impl SessionStats {
    /// Frames the deframer discarded.
    pub fn dropped(&self) -> u64 {
        self.checksum_mismatch + self.malformed_escape + self.too_short + self.overflow
    }
}

/// How a pending command wait was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Completion {
    Ok,
    Device(String),
    Protocol(String),
    Closed,
}

#[derive(Default)]
struct Pending {
    waiter: Option<SyncSender<Completion>>,
    /// Set by `ERROR_UNKNOWN`: the firmware follows it with its own `OK`/`ERROR`.
    trailer: bool,
}

#[derive(Default)]
struct Handlers {
    receive: Option<ReceiveHandler>,
    send: Option<SendHandler>,
}

/// Routes decoded frames: terminals release the pending wait, notifications
/// go to handlers, everything else lands in the result ring.
pub(crate) struct Dispatcher {
    pending: Mutex<Pending>,
    ring: Mutex<ResultRing>,
    handlers: Mutex<Handlers>,
    deframer: Mutex<DeframerStats>,
    closed: AtomicBool,
    late_terminals: AtomicU64,
    malformed_notifications: AtomicU64,
    handler_panics: AtomicU64,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            ring: Mutex::new(ResultRing::new()),
            handlers: Mutex::new(Handlers::default()),
            deframer: Mutex::new(DeframerStats::default()),
            closed: AtomicBool::new(false),
            late_terminals: AtomicU64::new(0),
            malformed_notifications: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
        }
    }

    /// Install a fresh pending wait and return its receiving end.
    pub(crate) fn arm(&self) -> Result<Receiver<Completion>> {
        let mut pending = lock(&self.pending);
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::ChannelClosed);
        }
        let (tx, rx) = mpsc::sync_channel(1);
        pending.waiter = Some(tx);
        Ok(rx)
    }

    /// Abandon the pending wait so a late terminal cannot release a later command.
    pub(crate) fn disarm(&self) {
        lock(&self.pending).waiter.take();
    }

    /// Block until the terminal that trails `ERROR_UNKNOWN` has been absorbed,
    /// or `grace` passes. Returns at once when no trailer is outstanding.
    pub(crate) fn await_trailer(&self, grace: Duration) {
        let rx = {
            let mut pending = lock(&self.pending);
            if !pending.trailer || self.closed.load(Ordering::Acquire) {
                return;
            }
            let (tx, rx) = mpsc::sync_channel(1);
            pending.waiter = Some(tx);
            rx
        };

        let absorbed = rx.recv_timeout(grace).is_ok();
        let mut pending = lock(&self.pending);
        pending.waiter = None;
        if !absorbed && pending.trailer {
            pending.trailer = false;
            debug!(grace = ?grace, "no terminal followed ERROR_UNKNOWN");
        }
    }

    /// Mark the session closed and fail any pending wait.
    pub(crate) fn shutdown(&self) {
        let mut pending = lock(&self.pending);
        self.closed.store(true, Ordering::Release);
        if let Some(tx) = pending.waiter.take() {
            let _ = tx.try_send(Completion::Closed);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn pop_result(&self) -> Option<Frame> {
        lock(&self.ring).pop_newest()
    }

    pub(crate) fn clear_results(&self) {
        lock(&self.ring).clear();
    }

    pub(crate) fn set_receive_handler(&self, handler: Option<ReceiveHandler>) {
        lock(&self.handlers).receive = handler;
    }

    pub(crate) fn set_send_handler(&self, handler: Option<SendHandler>) {
        lock(&self.handlers).send = handler;
    }

    pub(crate) fn record_deframer(&self, stats: DeframerStats) {
        *lock(&self.deframer) = stats;
    }

    pub(crate) fn stats(&self) -> SessionStats {
        let deframer = *lock(&self.deframer);
        SessionStats {
            frames: deframer.frames,
            checksum_mismatch: deframer.checksum_mismatch,
            malformed_escape: deframer.malformed_escape,
            too_short: deframer.too_short,
            overflow: deframer.overflow,
            late_terminals: self.late_terminals.load(Ordering::Relaxed),
            malformed_notifications: self.malformed_notifications.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }

    /// Route one frame. Frames must be dispatched in wire order.
    pub(crate) fn dispatch(&self, frame: Frame) {
        let opcode = match ResponseOpcode::try_from(frame.opcode) {
            Ok(opcode) => opcode,
            Err(code) => {
                debug!(opcode = code, "unknown response opcode, storing as result");
                self.store(frame);
                return;
            }
        };

        match opcode {
            ResponseOpcode::Ok => self.complete(opcode, Completion::Ok),
            ResponseOpcode::Error => {
                let message = error_text(&frame.payload);
                self.complete(opcode, Completion::Device(message));
            }
            ResponseOpcode::ErrorLen => {
                warn!("device rejected command length");
                self.complete(
                    opcode,
                    Completion::Protocol("device rejected command length".to_string()),
                );
            }
            ResponseOpcode::ErrorUnknown => {
                warn!("device did not recognise command");
                self.complete(
                    opcode,
                    Completion::Protocol("device did not recognise command".to_string()),
                );
            }
            ResponseOpcode::RecvCb => self.on_receive(frame.payload),
            ResponseOpcode::SendCb => self.on_send(&frame.payload),
            ResponseOpcode::Version
            | ResponseOpcode::Peer
            | ResponseOpcode::Address
            | ResponseOpcode::PeerExist
            | ResponseOpcode::PeerCount => self.store(frame),
        }
    }

    fn store(&self, frame: Frame) {
        if let Some(evicted) = lock(&self.ring).push(frame) {
            debug!(
                opcode = response_name(evicted.opcode),
                "result ring full, evicted oldest entry"
            );
        }
    }

    fn complete(&self, opcode: ResponseOpcode, completion: Completion) {
        let mut pending = lock(&self.pending);
        let terminal = matches!(opcode, ResponseOpcode::Ok | ResponseOpcode::Error);
        if terminal && pending.trailer {
            pending.trailer = false;
            self.late_terminals.fetch_add(1, Ordering::Relaxed);
            debug!(opcode = opcode.name(), "absorbed terminal trailing ERROR_UNKNOWN");
            if let Some(tx) = pending.waiter.take() {
                let _ = tx.try_send(Completion::Ok);
            }
            return;
        }
        if opcode == ResponseOpcode::ErrorUnknown {
            pending.trailer = true;
        }

        let waiter = pending.waiter.take();
        drop(pending);
        match waiter {
            // Capacity 1 and a single send per arm: try_send cannot be full.
            Some(tx) => {
                let _ = tx.try_send(completion);
            }
            None => {
                self.late_terminals.fetch_add(1, Ordering::Relaxed);
                debug!(opcode = opcode.name(), "terminal response with no pending command");
            }
        }
    }

    fn on_receive(&self, mut payload: Bytes) {
        if payload.len() < ADDRESS_LEN {
            self.malformed_notifications.fetch_add(1, Ordering::Relaxed);
            warn!(len = payload.len(), "RECV_CB too short, dropped");
            return;
        }
        let data = payload.split_off(ADDRESS_LEN);
        let Some(handler) = lock(&self.handlers).receive.clone() else {
            return;
        };
        if let Ok(source) = DeviceAddress::from_slice(&payload) {
            self.guard_handler("receive", || handler(source, data));
        }
    }

    fn on_send(&self, payload: &[u8]) {
        if payload.len() < ADDRESS_LEN + 1 {
            self.malformed_notifications.fetch_add(1, Ordering::Relaxed);
            warn!(len = payload.len(), "SEND_CB too short, dropped");
            return;
        }
        let status = SendStatus::from_byte(payload[ADDRESS_LEN]);
        let Some(handler) = lock(&self.handlers).send.clone() else {
            return;
        };
        if let Ok(dest) = DeviceAddress::from_slice(&payload[..ADDRESS_LEN]) {
            self.guard_handler("send", || handler(dest, status));
        }
    }

    /// Run a user handler; a panic is logged and counted and dispatch continues.
    fn guard_handler(&self, kind: &'static str, f: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
            self.handler_panics.fetch_add(1, Ordering::Relaxed);
            warn!(handler = kind, "notification handler panicked");
        }
    }
}

/// Render an `ERROR` payload. The firmware sends a one-byte `esp_err_t`, which
/// is always shown as a code even when it happens to be printable. Longer
/// printable UTF-8 is returned as text; anything else is shown as a code.
pub(crate) fn error_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if payload.len() > 1 && !text.chars().any(char::is_control) => {
            text.to_string()
        }
        _ if payload.is_empty() => "unspecified error".to_string(),
        _ => {
            let hex: String = payload.iter().map(|b| format!("{b:02X}")).collect();
            format!("error code 0x{hex}")
        }
    }
}

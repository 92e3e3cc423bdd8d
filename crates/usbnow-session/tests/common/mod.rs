//! Simulated USB-Now firmware on the device end of a memory transport pair.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use usbnow_frame::{encode_frame, Deframer, Frame, ResponseOpcode};
use usbnow_session::{Session, SessionConfig};
use usbnow_transport::{MemoryTransport, Transport};

pub type Responder = Box<dyn FnMut(&Frame, &DeviceLink) -> Vec<Frame> + Send>;

/// Handle to the device endpoint, shared between the firmware thread and the test.
#[derive(Clone)]
pub struct DeviceLink {
    transport: Arc<Mutex<MemoryTransport>>,
}

impl DeviceLink {
    /// Write one frame towards the host.
    pub fn emit(&self, frame: &Frame) {
        let mut wire = BytesMut::new();
        encode_frame(frame.opcode, &frame.payload, &mut wire);
        let _ = self.transport.lock().unwrap().write_all(&wire);
    }

    /// Write raw bytes towards the host.
    pub fn emit_raw(&self, bytes: &[u8]) {
        let _ = self.transport.lock().unwrap().write_all(bytes);
    }

    /// Bytes the host has written that the firmware has not read yet.
    pub fn pending(&self) -> usize {
        self.transport.lock().unwrap().pending()
    }

    pub fn close(&self) {
        let _ = self.transport.lock().unwrap().close();
    }
}

pub struct FakeDevice {
    pub link: DeviceLink,
    received: Arc<Mutex<Vec<Frame>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeDevice {
    /// Start firmware that answers each command with whatever `responder` returns.
    pub fn spawn(device: MemoryTransport, mut responder: Responder) -> Self {
        let link = DeviceLink {
            transport: Arc::new(Mutex::new(device)),
        };
        let received = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let link = link.clone();
            let received = Arc::clone(&received);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut deframer = Deframer::new();
                let mut buf = [0u8; 256];
                while !stop.load(Ordering::SeqCst) {
                    let read = link.transport.lock().unwrap().read_available(&mut buf);
                    let n = match read {
                        Ok(0) => {
                            thread::sleep(Duration::from_millis(1));
                            continue;
                        }
                        Ok(n) => n,
                        Err(_) => break,
                    };
                    for frame in deframer.push_slice(&buf[..n]) {
                        received.lock().unwrap().push(frame.clone());
                        for reply in responder(&frame, &link) {
                            link.emit(&reply);
                        }
                    }
                }
            })
        };

        Self {
            link,
            received,
            stop,
            handle: Some(handle),
        }
    }

    /// Commands received so far.
    pub fn received(&self) -> Vec<Frame> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn ok() -> Frame {
    reply(ResponseOpcode::Ok, &[])
}

pub fn error(text: &str) -> Frame {
    reply(ResponseOpcode::Error, text.as_bytes())
}

pub fn reply(opcode: ResponseOpcode, payload: &[u8]) -> Frame {
    Frame::new(opcode.code(), payload.to_vec())
}

pub fn config(timeout: Duration) -> SessionConfig {
    SessionConfig {
        timeout,
        ..SessionConfig::default()
    }
}

/// Open a session against firmware driven by `responder`.
pub fn connect<F>(timeout: Duration, responder: F) -> (Session<MemoryTransport>, FakeDevice)
where
    F: FnMut(&Frame, &DeviceLink) -> Vec<Frame> + Send + 'static,
{
    let (host, device) = MemoryTransport::pair();
    let device = FakeDevice::spawn(device, Box::new(responder));
    let session = Session::open(host, config(timeout)).unwrap();
    (session, device)
}

/// Poll `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

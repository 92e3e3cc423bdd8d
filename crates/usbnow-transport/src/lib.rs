//! Byte-stream transport abstraction for the USB-Now driver.
//!
//! The session layer only needs a duplex byte stream that can be polled
//! without blocking. This crate defines that contract ([`Transport`]) plus:
//! - an in-memory duplex pair ([`MemoryTransport`]) for loopback and tests
//! - a serial port adapter ([`SerialTransport`], behind the `serial` feature)
//!
//! This is the lowest layer; framing lives in `usbnow-frame`.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::{Transport, TransportConfig, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};

#[cfg(feature = "serial")]
pub use serial::{list_ports, SerialTransport};

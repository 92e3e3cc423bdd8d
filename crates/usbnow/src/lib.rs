//! Host driver for USB-Now ESP-NOW serial dongles.
//!
//! A USB-Now dongle bridges ESP-NOW radio traffic to a serial line. This
//! crate bundles the layers needed to drive one:
//!
//! - [`transport`]: byte-stream transport abstraction (serial, in-memory)
//! - [`frame`]: SLIP framing with additive checksums and opcode tables
//! - [`session`]: command/response engine, notifications and peer types
//!
//! ```no_run
//! # #[cfg(feature = "serial")]
//! # fn main() -> usbnow::session::Result<()> {
//! use usbnow::session::{DeviceAddress, Session, SessionConfig};
//! use usbnow::transport::{SerialTransport, TransportConfig};
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", TransportConfig::default());
//! let session = Session::open(transport, SessionConfig::default())?;
//! session.init()?;
//! session.set_receive_handler(|from, data| println!("[{from}] {data:?}"));
//! session.send(DeviceAddress::BROADCAST, b"hello")?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```

/// Re-export transport types.
pub mod transport {
    pub use usbnow_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use usbnow_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use usbnow_session::*;
}

pub use usbnow_session::{DeviceAddress, Session, SessionConfig, SessionError};

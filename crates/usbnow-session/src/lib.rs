//! Command/response session engine for USB-Now ESP-NOW dongles.
//!
//! A [`Session`] owns the transport and a reader thread. The reader turns
//! bytes into frames and routes them:
//! - `OK`/`ERROR` (and the firmware's length/unknown-command rejections)
//!   release the single pending command
//! - `RECV_CB`/`SEND_CB` notifications go to the registered handlers
//! - every other reply is kept in a 10-entry result ring, from which the
//!   command that asked for it takes the newest entry after `OK`
//!
//! Only one command is in flight at a time; callers on other threads block
//! until it completes or times out.

mod command;
mod dispatch;
mod reader;
mod response;

pub mod address;
pub mod error;
pub mod peer;
pub mod ring;
pub mod session;

pub use address::{DeviceAddress, ADDRESS_LEN};
pub use command::{MAX_SEND_LEN, PMK_LEN};
pub use dispatch::{ReceiveHandler, SendHandler, SendStatus, SessionStats};
pub use error::{Result, SessionError};
pub use peer::{PeerList, PeerRecord, MAX_CHANNEL};
pub use ring::{ResultRing, RESULT_RING_CAPACITY};
pub use session::{Session, SessionConfig, DEFAULT_COMMAND_TIMEOUT, DEFAULT_IDLE_BACKOFF};

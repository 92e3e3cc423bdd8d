use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::DeviceAddress;
use crate::error::{Result, SessionError};

/// Highest Wi-Fi channel accepted for a peer. `0` means "current channel".
pub const MAX_CHANNEL: u8 = 14;

/// One entry of the device peer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub address: DeviceAddress,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub encrypt: bool,
}

impl PeerRecord {
    /// Create a validated peer record.
    pub fn new(address: DeviceAddress, channel: u8, encrypt: bool) -> Result<Self> {
        let record = Self {
            address,
            channel,
            encrypt,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel > MAX_CHANNEL {
            return Err(SessionError::InvalidArgument(format!(
                "channel {} out of range 0..={MAX_CHANNEL}",
                self.channel
            )));
        }
        Ok(())
    }
}

/// A list of peers loaded from JSON:
///
/// ```json
/// [{ "address": "24:6F:28:AA:BB:CC", "channel": 1, "encrypt": false }]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerList {
    peers: Vec<PeerRecord>,
}

impl PeerList {
    /// Parse and validate a JSON peer list. One bad entry fails the whole list.
    pub fn from_json(text: &str) -> Result<Self> {
        let list: PeerList = serde_json::from_str(text)?;
        for (index, peer) in list.peers.iter().enumerate() {
            peer.validate().map_err(|err| match err {
                SessionError::InvalidArgument(msg) => {
                    SessionError::InvalidArgument(format!("peer #{index}: {msg}"))
                }
                other => other,
            })?;
        }
        Ok(list)
    }

    /// Read a JSON peer list from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeerRecord> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl From<Vec<PeerRecord>> for PeerList {
    fn from(peers: Vec<PeerRecord>) -> Self {
        Self { peers }
    }
}

impl<'a> IntoIterator for &'a PeerList {
    type Item = &'a PeerRecord;
    type IntoIter = std::slice::Iter<'a, PeerRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.peers.iter()
    }
}

impl IntoIterator for PeerList {
    type Item = PeerRecord;
    type IntoIter = std::vec::IntoIter<PeerRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.peers.into_iter()
    }
}

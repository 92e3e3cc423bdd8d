use usbnow_frame::{CommandOpcode, ResponseOpcode};

use crate::address::DeviceAddress;
use crate::error::{Result, SessionError};
use crate::peer::PeerRecord;

/// Largest radio payload the device accepts in one `SEND`.
pub const MAX_SEND_LEN: usize = 250;

/// Primary master key length.
pub const PMK_LEN: usize = 16;

/// One host → device command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Init,
    Deinit,
    GetVersion,
    Send { to: DeviceAddress, data: &'a [u8] },
    AddPeer(PeerRecord),
    DelPeer(DeviceAddress),
    ModPeer(PeerRecord),
    ConfigRate { interface: u8, rate: u8 },
    GetPeer(DeviceAddress),
    FetchPeer { from_head: bool },
    IsPeerExist(DeviceAddress),
    GetPeerCount,
    SetPmk(&'a [u8]),
    SetWakeWindow(u16),
    GetDeviceAddress,
}

impl Command<'_> {
    pub(crate) fn opcode(&self) -> CommandOpcode {
        match self {
            Command::Init => CommandOpcode::Init,
            Command::Deinit => CommandOpcode::Deinit,
            Command::GetVersion => CommandOpcode::GetVersion,
            Command::Send { .. } => CommandOpcode::Send,
            Command::AddPeer(_) => CommandOpcode::AddPeer,
            Command::DelPeer(_) => CommandOpcode::DelPeer,
            Command::ModPeer(_) => CommandOpcode::ModPeer,
            Command::ConfigRate { .. } => CommandOpcode::ConfigRate,
            Command::GetPeer(_) => CommandOpcode::GetPeer,
            Command::FetchPeer { .. } => CommandOpcode::FetchPeer,
            Command::IsPeerExist(_) => CommandOpcode::IsPeerExist,
            Command::GetPeerCount => CommandOpcode::GetPeerCount,
            Command::SetPmk(_) => CommandOpcode::SetPmk,
            Command::SetWakeWindow(_) => CommandOpcode::SetWakeWindow,
            Command::GetDeviceAddress => CommandOpcode::GetDeviceAddress,
        }
    }

    /// Informational reply that precedes `OK`, if any.
    pub(crate) fn expected_reply(&self) -> Option<ResponseOpcode> {
        match self {
            Command::GetVersion => Some(ResponseOpcode::Version),
            Command::GetPeer(_) | Command::FetchPeer { .. } => Some(ResponseOpcode::Peer),
            Command::IsPeerExist(_) => Some(ResponseOpcode::PeerExist),
            Command::GetPeerCount => Some(ResponseOpcode::PeerCount),
            Command::GetDeviceAddress => Some(ResponseOpcode::Address),
            _ => None,
        }
    }

    /// Reject arguments the firmware would refuse, before anything is written.
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Command::Send { data, .. } if data.is_empty() || data.len() > MAX_SEND_LEN => {
                Err(SessionError::InvalidArgument(format!(
                    "send payload must be 1..={MAX_SEND_LEN} bytes, got {}",
                    data.len()
                )))
            }
            Command::AddPeer(peer) | Command::ModPeer(peer) => peer.validate(),
            Command::SetPmk(key) if key.len() != PMK_LEN => {
                Err(SessionError::InvalidArgument(format!(
                    "PMK must be exactly {PMK_LEN} bytes, got {}",
                    key.len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Fixed-layout payload following the opcode byte.
    pub(crate) fn payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Command::Init
            | Command::Deinit
            | Command::GetVersion
            | Command::GetPeerCount
            | Command::GetDeviceAddress => {}
            Command::Send { to, data } => {
                out.extend_from_slice(to.as_bytes());
                out.extend_from_slice(data);
            }
            Command::AddPeer(peer) | Command::ModPeer(peer) => {
                out.extend_from_slice(peer.address.as_bytes());
                out.push(peer.channel);
                out.push(u8::from(peer.encrypt));
            }
            Command::DelPeer(addr) | Command::GetPeer(addr) | Command::IsPeerExist(addr) => {
                out.extend_from_slice(addr.as_bytes());
            }
            Command::ConfigRate { interface, rate } => out.extend_from_slice(&[*interface, *rate]),
            Command::FetchPeer { from_head } => out.push(u8::from(*from_head)),
            Command::SetPmk(key) => out.extend_from_slice(key),
            // The firmware reads the window as `(b1 << 8) | b2`.
            Command::SetWakeWindow(window) => out.extend_from_slice(&window.to_be_bytes()),
        }
        out
    }
}

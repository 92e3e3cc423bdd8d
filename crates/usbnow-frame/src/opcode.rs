//! Opcode tables.
//!
//! Commands flow host → device, responses device → host. Both are a single
//! leading byte and the two sets are never compared with each other.

/// Host → device command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandOpcode {
    Init = 0,
    Deinit = 1,
    GetVersion = 2,
    Send = 3,
    AddPeer = 4,
    DelPeer = 5,
    ModPeer = 6,
    ConfigRate = 7,
    GetPeer = 8,
    FetchPeer = 9,
    IsPeerExist = 10,
    GetPeerCount = 11,
    SetPmk = 12,
    SetWakeWindow = 13,
    GetDeviceAddress = 14,
}

impl CommandOpcode {
    /// Wire value.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            CommandOpcode::Init => "INIT",
            CommandOpcode::Deinit => "DEINIT",
            CommandOpcode::GetVersion => "GET_VERSION",
            CommandOpcode::Send => "SEND",
            CommandOpcode::AddPeer => "ADD_PEER",
            CommandOpcode::DelPeer => "DEL_PEER",
            CommandOpcode::ModPeer => "MOD_PEER",
            CommandOpcode::ConfigRate => "CONFIG_RATE",
            CommandOpcode::GetPeer => "GET_PEER",
            CommandOpcode::FetchPeer => "FETCH_PEER",
            CommandOpcode::IsPeerExist => "IS_PEER_EXIST",
            CommandOpcode::GetPeerCount => "GET_PEER_COUNT",
            CommandOpcode::SetPmk => "SET_PMK",
            CommandOpcode::SetWakeWindow => "SET_WAKE_WINDOW",
            CommandOpcode::GetDeviceAddress => "GET_DEVICE_ADDRESS",
        }
    }
}

impl TryFrom<u8> for CommandOpcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0 => CommandOpcode::Init,
            1 => CommandOpcode::Deinit,
            2 => CommandOpcode::GetVersion,
            3 => CommandOpcode::Send,
            4 => CommandOpcode::AddPeer,
            5 => CommandOpcode::DelPeer,
            6 => CommandOpcode::ModPeer,
            7 => CommandOpcode::ConfigRate,
            8 => CommandOpcode::GetPeer,
            9 => CommandOpcode::FetchPeer,
            10 => CommandOpcode::IsPeerExist,
            11 => CommandOpcode::GetPeerCount,
            12 => CommandOpcode::SetPmk,
            13 => CommandOpcode::SetWakeWindow,
            14 => CommandOpcode::GetDeviceAddress,
            other => return Err(other),
        })
    }
}

/// Device → host response opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseOpcode {
    /// Terminal: command succeeded.
    Ok = 0,
    /// Terminal: command failed, payload is the error text.
    Error = 1,
    Version = 2,
    Peer = 3,
    Address = 4,
    PeerExist = 5,
    PeerCount = 6,
    /// Notification: radio data received.
    RecvCb = 7,
    /// Notification: radio send completed.
    SendCb = 8,
    /// Firmware rejected the command length.
    ErrorLen = 9,
    /// Firmware did not recognise the command.
    ErrorUnknown = 10,
}

impl ResponseOpcode {
    /// Wire value.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ResponseOpcode::Ok => "OK",
            ResponseOpcode::Error => "ERROR",
            ResponseOpcode::Version => "VERSION",
            ResponseOpcode::Peer => "PEER",
            ResponseOpcode::Address => "ADDRESS",
            ResponseOpcode::PeerExist => "PEER_EXIST",
            ResponseOpcode::PeerCount => "PEER_COUNT",
            ResponseOpcode::RecvCb => "RECV_CB",
            ResponseOpcode::SendCb => "SEND_CB",
            ResponseOpcode::ErrorLen => "ERROR_LEN",
            ResponseOpcode::ErrorUnknown => "ERROR_UNKNOWN",
        }
    }

    /// Informational replies that precede an `OK` and carry command results.
    pub fn is_informational(self) -> bool {
        matches!(
            self,
            ResponseOpcode::Version
                | ResponseOpcode::Peer
                | ResponseOpcode::Address
                | ResponseOpcode::PeerExist
                | ResponseOpcode::PeerCount
        )
    }

    /// Unsolicited device notifications.
    pub fn is_notification(self) -> bool {
        matches!(self, ResponseOpcode::RecvCb | ResponseOpcode::SendCb)
    }
}

impl TryFrom<u8> for ResponseOpcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0 => ResponseOpcode::Ok,
            1 => ResponseOpcode::Error,
            2 => ResponseOpcode::Version,
            3 => ResponseOpcode::Peer,
            4 => ResponseOpcode::Address,
            5 => ResponseOpcode::PeerExist,
            6 => ResponseOpcode::PeerCount,
            7 => ResponseOpcode::RecvCb,
            8 => ResponseOpcode::SendCb,
            9 => ResponseOpcode::ErrorLen,
            10 => ResponseOpcode::ErrorUnknown,
            other => return Err(other),
        })
    }
}

/// Name of a response byte, `"UNKNOWN"` when it is not in the table.
pub fn response_name(code: u8) -> &'static str {
    ResponseOpcode::try_from(code)
        .map(ResponseOpcode::name)
        .unwrap_or("UNKNOWN")
}

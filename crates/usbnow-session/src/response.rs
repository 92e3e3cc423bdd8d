//! Decoders for informational reply payloads.
//!
//! Firmware revisions disagree on some widths, so decoding accepts every
//! layout seen in the field and rejects anything else as a protocol error.

use crate::address::{DeviceAddress, ADDRESS_LEN};
use crate::error::{Result, SessionError};
use crate::peer::PeerRecord;

fn short(what: &str, payload: &[u8]) -> SessionError {
    SessionError::Protocol(format!(
        "{what} reply has unexpected length {}",
        payload.len()
    ))
}

/// `VERSION`: 1..=4 little-endian bytes.
pub(crate) fn decode_version(payload: &[u8]) -> Result<u32> {
    if payload.is_empty() || payload.len() > 4 {
        return Err(short("VERSION", payload));
    }
    let mut bytes = [0u8; 4];
    bytes[..payload.len()].copy_from_slice(payload);
    Ok(u32::from_le_bytes(bytes))
}

/// `PEER`: address, channel, encrypt flag.
pub(crate) fn decode_peer(payload: &[u8]) -> Result<PeerRecord> {
    if payload.len() < ADDRESS_LEN + 2 {
        return Err(short("PEER", payload));
    }
    Ok(PeerRecord {
        address: DeviceAddress::from_slice(&payload[..ADDRESS_LEN])?,
        channel: payload[ADDRESS_LEN],
        encrypt: payload[ADDRESS_LEN + 1] != 0,
    })
}

/// `ADDRESS`: the device's own address.
pub(crate) fn decode_address(payload: &[u8]) -> Result<DeviceAddress> {
    if payload.len() < ADDRESS_LEN {
        return Err(short("ADDRESS", payload));
    }
    DeviceAddress::from_slice(&payload[..ADDRESS_LEN])
}

/// `PEER_EXIST`: one boolean byte.
pub(crate) fn decode_peer_exist(payload: &[u8]) -> Result<bool> {
    match payload.first() {
        Some(&flag) => Ok(flag != 0),
        None => Err(short("PEER_EXIST", payload)),
    }
}

/// `PEER_COUNT`: a little-endian `i32`, or a `(total, encrypted)` byte pair.
pub(crate) fn decode_peer_count(payload: &[u8]) -> Result<i32> {
    match *payload {
        [a, b, c, d] => Ok(i32::from_le_bytes([a, b, c, d])),
        [total, _encrypted] => Ok(i32::from(total)),
        _ => Err(short("PEER_COUNT", payload)),
    }
}

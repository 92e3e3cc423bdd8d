use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SessionError};

/// Length of an ESP-NOW device address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// A 6-byte ESP-NOW device (MAC) address.
///
/// Parses from `AA:BB:CC:DD:EE:FF` or `aa-bb-cc-dd-ee-ff` and always renders
/// as uppercase, colon separated.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress([u8; ADDRESS_LEN]);

impl DeviceAddress {
    /// `FF:FF:FF:FF:FF:FF`.
    pub const BROADCAST: Self = Self([0xFF; ADDRESS_LEN]);

    pub const fn new(octets: [u8; ADDRESS_LEN]) -> Self {
        Self(octets)
    }

    /// Build from exactly six raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let octets: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            SessionError::InvalidAddress(format!(
                "expected {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(octets))
    }

    /// Build from six integers, each in `0..=255`.
    pub fn from_ints(values: &[i64]) -> Result<Self> {
        if values.len() != ADDRESS_LEN {
            return Err(SessionError::InvalidAddress(format!(
                "expected {ADDRESS_LEN} values, got {}",
                values.len()
            )));
        }
        let mut octets = [0u8; ADDRESS_LEN];
        for (slot, &value) in octets.iter_mut().zip(values) {
            *slot = u8::try_from(value).map_err(|_| {
                SessionError::InvalidAddress(format!("octet {value} out of range 0..=255"))
            })?;
        }
        Ok(Self(octets))
    }

    pub fn octets(&self) -> [u8; ADDRESS_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl From<[u8; ADDRESS_LEN]> for DeviceAddress {
    fn from(octets: [u8; ADDRESS_LEN]) -> Self {
        Self(octets)
    }
}

impl TryFrom<&[u8]> for DeviceAddress {
    type Error = SessionError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_slice(bytes)
    }
}

impl AsRef<[u8]> for DeviceAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SessionError::InvalidAddress(s.to_string());

        let separator = if s.contains(':') { ':' } else { '-' };
        let mut octets = [0u8; ADDRESS_LEN];
        let mut count = 0;
        for part in s.trim().split(separator) {
            if count == ADDRESS_LEN
                || part.is_empty()
                || part.len() > 2
                || !part.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(invalid());
            }
            octets[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            count += 1;
        }
        if count != ADDRESS_LEN {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAddress({self})")
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

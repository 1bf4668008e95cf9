// 128-bit GUIDs as used by ASF objects and ISO `uuid` boxes

use crate::error::{Error, Result};
use crate::tree::Identifier;
use std::fmt;
use std::str::FromStr;

/// Globally unique identifier split into its canonical fields
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const NIL: Guid = Guid::from_fields(0, 0, 0, [0; 8]);

    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Decode the Microsoft layout: first three fields little-endian, last eight bytes literal
    pub fn from_ms_bytes(bytes: [u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..]);
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4,
        }
    }

    pub fn to_ms_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..].copy_from_slice(&self.data4);
        out
    }

    /// Decode the network (big-endian) layout
    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..]);
        Self {
            data1: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_be_bytes([bytes[4], bytes[5]]),
            data3: u16::from_be_bytes([bytes[6], bytes[7]]),
            data4,
        }
    }

    pub fn to_be_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..4].copy_from_slice(&self.data1.to_be_bytes());
        out[4..6].copy_from_slice(&self.data2.to_be_bytes());
        out[6..8].copy_from_slice(&self.data3.to_be_bytes());
        out[8..].copy_from_slice(&self.data4);
        out
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl Identifier for Guid {
    fn case_insensitive(&self) -> bool {
        true
    }
}

impl FromStr for Guid {
    type Err = Error;

    /// Parse the hyphenated text form, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let hex: String = s.chars().filter(|&c| c != '-').collect();
        let groups: Vec<usize> = s.split('-').map(str::len).collect();
        if !hex.is_ascii() || hex.len() != 32 || groups != [8, 4, 4, 4, 12] {
            return Err(Error::invalid(format!("'{}' is not a GUID", s)));
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::invalid(format!("'{}' is not a GUID", s)))?;
        }
        Ok(Guid::from_be_bytes(bytes))
    }
}

//! Index keys
//!
//! 128-bit content-derived identifiers. Bytes are stored big-endian, so the
//! derived byte-wise ordering is the unsigned integer ordering.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};

use crate::error::SegError;
use crate::page::Number;

/// MD5-sized key compared as an unsigned 128-bit integer
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key([u8; Key::LEN]);

impl Key {
    /// Encoded length in bytes
    pub const LEN: usize = 16;

    pub const MIN: Key = Key([0x00; Key::LEN]);
    pub const MAX: Key = Key([0xff; Key::LEN]);

    pub const fn new(bytes: [u8; Key::LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a key from content
    pub fn generate(content: impl AsRef<[u8]>) -> Self {
        let digest = Md5::digest(content.as_ref());
        let mut bytes = [0u8; Key::LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SegError> {
        let bytes: [u8; Key::LEN] = bytes.try_into().map_err(|_| {
            SegError::Serialization(format!("key must be {} bytes, got {}", Key::LEN, bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    pub const fn as_u128(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }

    pub fn bytes(&self) -> &[u8; Key::LEN] {
        &self.0
    }

    /// `self + delta`, or `None` past `Key::MAX`
    pub fn checked_add(self, delta: u128) -> Option<Key> {
        self.as_u128().checked_add(delta).map(Key::from_u128)
    }
}

impl Number for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.as_u128())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

impl FromStr for Key {
    type Err = SegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Key::LEN * 2 {
            return Err(SegError::Serialization(format!(
                "invalid key hex length {}",
                s.len()
            )));
        }
        u128::from_str_radix(s, 16)
            .map(Key::from_u128)
            .map_err(|e| SegError::Serialization(format!("invalid key hex {:?}: {}", s, e)))
    }
}

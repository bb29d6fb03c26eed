//! Codec Module
//!
//! Value encoding beneath the page stores.
//!
//! ## Responsibilities
//! - Turn caller values into bytes and back (`Codec`)
//! - Report a value's encoded length without keeping the bytes around
//! - Frame every journal/log record with a length prefix and a CRC32 so a
//!   torn tail is distinguishable from a complete record (`Framed`)
//!
//! ## Record Format
//! ```text
//! ┌─────────┬─────────┬──────────────────┐
//! │ Len (4) │ CRC (4) │ Payload (Len)    │
//! └─────────┴─────────┴──────────────────┘
//! ```

mod frame;

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SegError};

pub use frame::{Framed, FRAME_HEADER_LEN};

/// Encodes values of one type to bytes and back
pub trait Codec {
    type Item;

    fn encode(&self, item: &Self::Item) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Item>;

    /// Encoded length of `item` in bytes
    fn encoded_len(&self, item: &Self::Item) -> Result<usize> {
        Ok(self.encode(item)?.len())
    }
}

// =============================================================================
// Bincode
// =============================================================================

/// Serde-backed codec using bincode's compact binary format
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Codec for BincodeCodec<T> {
    type Item = T;

    fn encode(&self, item: &T) -> Result<Vec<u8>> {
        bincode::serialize(item).map_err(|e| SegError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| SegError::Serialization(e.to_string()))
    }

    fn encoded_len(&self, item: &T) -> Result<usize> {
        let size =
            bincode::serialized_size(item).map_err(|e| SegError::Serialization(e.to_string()))?;
        Ok(size as usize)
    }
}

// =============================================================================
// Raw bytes
// =============================================================================

/// Pass-through codec for payloads that are already bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Item = Vec<u8>;

    fn encode(&self, item: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(item.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn encoded_len(&self, item: &Vec<u8>) -> Result<usize> {
        Ok(item.len())
    }
}

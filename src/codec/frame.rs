//! Record framing
//!
//! Length + CRC32 wrapper applied to every variable-length record.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, SegError};
use crate::page::{Number, Page};

use super::Codec;

/// Header size: Len (4) + CRC (4) = 8 bytes
pub const FRAME_HEADER_LEN: usize = 8;

/// Wraps a codec so every encoded value carries its length and checksum
#[derive(Debug, Clone, Default)]
pub struct Framed<C> {
    inner: C,
}

impl<C: Codec> Framed<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Encode `item` into a complete frame
    pub fn encode(&self, item: &C::Item) -> Result<Vec<u8>> {
        let payload = self.inner.encode(item)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            SegError::Serialization(format!("payload of {} bytes is too large", payload.len()))
        })?;

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        buf.put_u32_le(len);
        buf.put_u32_le(crc32fast::hash(&payload));
        buf.put_slice(&payload);
        Ok(buf.to_vec())
    }

    /// Total frame length of `item`, header included
    pub fn frame_len(&self, item: &C::Item) -> Result<u64> {
        Ok((FRAME_HEADER_LEN + self.inner.encoded_len(item)?) as u64)
    }

    /// Decode the frame starting at `offset` in `page`.
    ///
    /// Returns the value and the frame's total length.
    pub fn read<N: Number>(&self, page: &Page<N>, offset: u64) -> Result<(C::Item, u64)> {
        let (payload, frame_len) = read_payload(page, offset)?;
        Ok((self.inner.decode(&payload)?, frame_len))
    }

    /// Validate the frame at `offset` without decoding its payload
    pub fn check<N: Number>(&self, page: &Page<N>, offset: u64) -> Result<u64> {
        read_payload(page, offset).map(|(_, frame_len)| frame_len)
    }
}

fn read_payload<N: Number>(page: &Page<N>, offset: u64) -> Result<(Vec<u8>, u64)> {
    let available = page.len().saturating_sub(offset);
    if available < FRAME_HEADER_LEN as u64 {
        return Err(corrupt(page, offset, "truncated header"));
    }

    let header = page.read_at(offset, FRAME_HEADER_LEN)?;
    let mut header = header.as_slice();
    let len = header.get_u32_le() as u64;
    let crc = header.get_u32_le();

    if FRAME_HEADER_LEN as u64 + len > available {
        return Err(corrupt(page, offset, "truncated payload"));
    }

    let payload = page.read_at(offset + FRAME_HEADER_LEN as u64, len as usize)?;
    if crc32fast::hash(&payload) != crc {
        return Err(corrupt(page, offset, "checksum mismatch"));
    }

    Ok((payload, FRAME_HEADER_LEN as u64 + len))
}

fn corrupt<N: Number>(page: &Page<N>, offset: u64, reason: &str) -> SegError {
    SegError::CorruptRecord {
        path: page.path().to_path_buf(),
        offset,
        reason: reason.to_string(),
    }
}

//! Page
//!
//! A bounded, append-only file segment identified by its starting `Number`.
//!
//! Writable pages append through the file handle. Sealed pages are read-only
//! and memory-mapped; preallocated pages are written through a read-write
//! mapping. Every path that truncates or deletes the file drops the mapping
//! first.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut};
use tracing::trace;

use crate::error::{Result, SegError};

use super::Number;

#[derive(Debug)]
enum Mapping {
    Unmapped,
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

/// One file segment of a page store
#[derive(Debug)]
pub struct Page<N> {
    path: PathBuf,
    number: N,
    /// Maximum bytes this page may hold
    capacity: u64,
    /// Write pointer: bytes [0, len) are valid
    len: u64,
    /// Dropped before `file`
    mapping: Mapping,
    file: File,
    read_only: bool,
}

impl<N: Number> Page<N> {
    /// Create a new, empty, writable page. Fails if the file exists.
    pub fn create(path: &Path, number: N, capacity: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        trace!(path = %path.display(), %number, "created page");

        Ok(Self {
            path: path.to_path_buf(),
            number,
            capacity,
            len: 0,
            mapping: Mapping::Unmapped,
            file,
            read_only: false,
        })
    }

    /// Open an existing file as a writable page positioned at its end
    pub fn open(path: &Path, number: N, capacity: u64) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            number,
            capacity: capacity.max(len),
            len,
            mapping: Mapping::Unmapped,
            file,
            read_only: false,
        })
    }

    /// Open an existing file as a sealed, memory-mapped page
    pub fn open_read_only(path: &Path, number: N) -> Result<Self> {
        let mut page = Self::open(path, number, 0)?;
        page.seal()?;
        Ok(page)
    }

    /// Create a file of exactly `capacity` bytes written through a
    /// read-write mapping
    pub fn preallocate(path: &Path, number: N, capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(SegError::Overflow {
                needed: 1,
                remaining: 0,
            });
        }

        let mut page = Self::create(path, number, capacity)?;
        page.file.set_len(capacity)?;
        // SAFETY: the file is owned by this page and only resized after the
        // mapping is dropped.
        let map = unsafe { MmapMut::map_mut(&page.file)? };
        page.mapping = Mapping::ReadWrite(map);
        Ok(page)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn number(&self) -> N {
        self.number
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn remaining(&self) -> u64 {
        self.capacity.saturating_sub(self.len)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // =========================================================================
    // Reads and Writes
    // =========================================================================

    /// Append `bytes`, returning the in-page offset they were written at
    pub fn append(&mut self, bytes: &[u8], force: bool) -> Result<u64> {
        if self.read_only {
            return Err(SegError::ReadOnly(self.path.clone()));
        }

        let needed = bytes.len() as u64;
        if needed > self.remaining() {
            return Err(SegError::Overflow {
                needed,
                remaining: self.remaining(),
            });
        }

        let offset = self.len;
        if let Mapping::ReadWrite(map) = &mut self.mapping {
            let start = offset as usize;
            map[start..start + bytes.len()].copy_from_slice(bytes);
        } else {
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.write_all(bytes)?;
        }
        self.len += needed;

        if force {
            self.force()?;
        }
        Ok(offset)
    }

    /// Copy `len` bytes starting at `offset`
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let end = offset + len as u64;
        if end > self.len {
            return Err(SegError::NotFound(format!(
                "bytes [{}, {}) beyond write position {} of page {}",
                offset, end, self.len, self.number
            )));
        }

        if let Some(bytes) = self.mapped() {
            return Ok(bytes[offset as usize..end as usize].to_vec());
        }

        let mut buf = vec![0u8; len];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Valid bytes of a mapped page; `None` for unmapped writable pages
    pub fn mapped(&self) -> Option<&[u8]> {
        let len = self.len as usize;
        match &self.mapping {
            Mapping::ReadOnly(map) => Some(&map[..len]),
            Mapping::ReadWrite(map) => Some(&map[..len]),
            Mapping::Unmapped if self.read_only && len == 0 => Some(&[]),
            Mapping::Unmapped => None,
        }
    }

    /// Valid bytes of a preallocated page, for in-place updates
    pub fn mapped_mut(&mut self) -> Result<&mut [u8]> {
        let len = self.len as usize;
        match &mut self.mapping {
            Mapping::ReadWrite(map) => Ok(&mut map[..len]),
            _ => Err(SegError::ReadOnly(self.path.clone())),
        }
    }

    /// Flush written bytes to durable storage
    pub fn force(&mut self) -> Result<()> {
        if let Mapping::ReadWrite(map) = &self.mapping {
            map.flush()?;
        }
        if !self.read_only {
            self.file.sync_data()?;
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Make the page read-only: flush, release any writable mapping, trim
    /// unused preallocated space and map the valid bytes read-only
    pub fn seal(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }

        self.force()?;
        self.mapping = Mapping::Unmapped;
        if self.file.metadata()?.len() != self.len {
            self.file.set_len(self.len)?;
        }
        self.read_only = true;
        self.capacity = self.len;
        self.map_read_only()
    }

    /// Cut the page down to `len` bytes
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        if len > self.len {
            return Err(SegError::NotFound(format!(
                "cannot truncate page {} of {} bytes to {}",
                self.number, self.len, len
            )));
        }

        self.mapping = Mapping::Unmapped;
        self.file.set_len(len)?;
        self.len = len;
        if self.read_only {
            self.capacity = len;
            self.map_read_only()?;
        }
        Ok(())
    }

    /// Copy bytes `[from, len)` into a new writable page at `path`
    pub fn copy_tail(&self, from: u64, path: &Path, number: N, capacity: u64) -> Result<Page<N>> {
        let bytes = self.read_at(from, (self.len - from) as usize)?;
        let mut right = Page::create(path, number, capacity.max(bytes.len() as u64))?;
        right.append(&bytes, true)?;
        Ok(right)
    }

    /// Release the mapping. The file handle is closed on drop.
    pub fn close(&mut self) {
        self.mapping = Mapping::Unmapped;
    }

    /// Unmap, close and remove the file
    pub fn delete(mut self) -> Result<()> {
        self.close();
        let path = std::mem::take(&mut self.path);
        drop(self);
        fs::remove_file(&path)?;
        trace!(path = %path.display(), "deleted page");
        Ok(())
    }

    fn map_read_only(&mut self) -> Result<()> {
        if self.len > 0 {
            // SAFETY: sealed pages are never written; truncation drops the
            // mapping before resizing the file.
            let map = unsafe { Mmap::map(&self.file)? };
            self.mapping = Mapping::ReadOnly(map);
        }
        Ok(())
    }
}

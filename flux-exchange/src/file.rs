//! Positioned file access.
//!
//! The exchange assumes only two things of its spill files: "append
//! sequentially while open" and "read at arbitrary offset once sealed". This
//! module wraps `std::fs::File` behind that contract - every operation takes
//! an explicit offset and the handle is shareable across readers and outbound
//! file-region messages via `Arc`.
//!
//! Reads and writes are synchronous by design: the poll path never blocks on
//! anything but the disk itself, and the handle is handed to the transport
//! for zero-copy transfers.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{ExchangeError, ExchangeResult};

/// A positioned-access file handle.
///
/// The inner file is guarded by a mutex because positioned access is
/// implemented as seek-then-read; concurrent readers at different offsets
/// must not interleave the two steps.
#[derive(Debug)]
pub struct FileHandle {
    file: Mutex<File>,
}

impl FileHandle {
    /// Creates (or truncates) a file for writing and later reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> ExchangeResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| ExchangeError::io("create", e))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes `data` at the given offset.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> ExchangeResult<()> {
        let mut file = self.file.lock().expect("file lock poisoned");
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ExchangeError::io("seek", e))?;
        file.write_all(data)
            .map_err(|e| ExchangeError::io("write", e))?;
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Loops until the buffer is filled. Reaching end of file before that is
    /// a corruption-class [`ExchangeError::TruncatedRead`], never a retry
    /// condition.
    ///
    /// # Errors
    /// Returns an error if the read fails or comes up short.
    pub fn read_fully(&self, offset: u64, buf: &mut [u8]) -> ExchangeResult<()> {
        let mut file = self.file.lock().expect("file lock poisoned");
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ExchangeError::io("seek", e))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file
                .read(&mut buf[filled..])
                .map_err(|e| ExchangeError::io("read", e))?;
            if n == 0 {
                #[allow(clippy::cast_possible_truncation)] // Frame sizes fit in u32.
                return Err(ExchangeError::TruncatedRead {
                    offset,
                    expected: buf.len() as u32,
                    found: filled as u32,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Returns the current file size in bytes.
    ///
    /// # Errors
    /// Returns an error if the size cannot be determined.
    pub fn size(&self) -> ExchangeResult<u64> {
        let file = self.file.lock().expect("file lock poisoned");
        let metadata = file.metadata().map_err(|e| ExchangeError::io("metadata", e))?;
        Ok(metadata.len())
    }

    /// Syncs all buffered data to disk (fsync).
    ///
    /// # Errors
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> ExchangeResult<()> {
        let file = self.file.lock().expect("file lock poisoned");
        file.sync_all().map_err(|e| ExchangeError::io("sync", e))
    }
}

//! Bounded blocking stores.
//!
//! A [`BoundedStore`] persists a finished sequence of units to a spill file -
//! write-once, sealed by [`BoundedStore::finish_write`] - and lets
//! independent sequential readers replay it with bounded memory.
//!
//! # Spill File Format
//!
//! ```text
//! +---------------------+---------------------+-----+
//! | Frame 1             | Frame 2             | ... |
//! +---------------------+---------------------+-----+
//! ```
//!
//! Each frame:
//! - Data type (2 bytes): unit kind tag
//! - Compressed (2 bytes): 0 or 1
//! - Length (4 bytes): payload length
//! - Payload (N bytes)
//!
//! All integers are stored in little-endian format. There is no index; the
//! file is read start-to-end in write order.
//!
//! # Bounded read-ahead
//!
//! Every [`BoundedReader`] owns a fixed pool of `k` scratch segments. A unit
//! holds one segment from read until recycle, so at most `k` units are ever
//! in flight; the `(k+1)`-th read returns "not yet" instead of blocking, and
//! the recycle of any outstanding unit re-notifies the registered listener.
//! That notification is the sole mechanism that un-stalls a consumer - it is
//! suppressed only after the reader reaches end-of-stream or closes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, trace};

use flux_buffer::{
    AvailabilityListener, Buffer, BufferBacking, BufferRecycler, DataType, SegmentPool,
};
use flux_core::{Limits, SubpartitionId};

use crate::error::{ExchangeError, ExchangeResult};
use crate::file::FileHandle;
use crate::unit::PartitionData;
use crate::view::{Poll, RawMessage, SubpartitionView};

/// Size of the frame header in bytes.
pub const FRAME_HEADER_BYTES: u64 = 8; // 2 + 2 + 4

/// Configuration for a bounded store.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Capacity of each scratch segment in bytes. Also the largest unit
    /// payload the store accepts, so every written unit can be staged back.
    pub segment_bytes: u32,
    /// Number of scratch segments per reader (read-ahead depth).
    pub read_segments: u32,
}

impl StoreConfig {
    /// Creates a configuration with the default limits.
    #[must_use]
    pub const fn new() -> Self {
        let limits = Limits::new();
        Self {
            segment_bytes: limits.default_segment_bytes,
            read_segments: limits.default_read_segments,
        }
    }

    /// Creates a small configuration for testing.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            segment_bytes: 1024,
            read_segments: 2,
        }
    }

    /// Sets the scratch segment capacity.
    ///
    /// # Panics
    /// Panics if `segment_bytes` is zero.
    #[must_use]
    pub const fn with_segment_bytes(mut self, segment_bytes: u32) -> Self {
        assert!(segment_bytes > 0, "segment capacity must be positive");
        self.segment_bytes = segment_bytes;
        self
    }

    /// Sets the read-ahead depth.
    ///
    /// # Panics
    /// Panics if `read_segments` is zero or exceeds the system limit.
    #[must_use]
    pub const fn with_read_segments(mut self, read_segments: u32) -> Self {
        assert!(read_segments > 0, "read-ahead depth must be positive");
        assert!(
            read_segments <= Limits::new().max_read_segments,
            "read-ahead depth exceeds limit"
        );
        self.read_segments = read_segments;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> flux_core::Result<()> {
        if self.segment_bytes == 0 {
            return Err(flux_core::Error::InvalidArgument {
                name: "segment_bytes",
                reason: "must be positive",
            });
        }
        if self.read_segments == 0 {
            return Err(flux_core::Error::InvalidArgument {
                name: "read_segments",
                reason: "must be positive",
            });
        }
        let limits = Limits::new();
        if self.read_segments > limits.max_read_segments {
            return Err(flux_core::Error::LimitExceeded {
                limit: "read_segments",
                max: u64::from(limits.max_read_segments),
                actual: u64::from(self.read_segments),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One frame header as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    data_type: DataType,
    compressed: bool,
    length: u32,
}

impl FrameHeader {
    fn encode(self, buf: &mut BytesMut) {
        buf.put_u16_le(self.data_type.to_wire());
        buf.put_u16_le(u16::from(self.compressed));
        buf.put_u32_le(self.length);
    }

    fn decode(mut raw: &[u8], offset: u64) -> ExchangeResult<Self> {
        debug_assert_eq!(raw.len() as u64, FRAME_HEADER_BYTES);

        let data_type = DataType::from_wire(raw.get_u16_le()).ok_or(
            ExchangeError::InvalidFrame {
                offset,
                reason: "unknown data type tag",
            },
        )?;
        if data_type.is_none() {
            return Err(ExchangeError::InvalidFrame {
                offset,
                reason: "frame cannot carry the none data type",
            });
        }

        let compressed = match raw.get_u16_le() {
            0 => false,
            1 => true,
            _ => {
                return Err(ExchangeError::InvalidFrame {
                    offset,
                    reason: "invalid compressed flag",
                })
            }
        };

        let length = raw.get_u32_le();
        Ok(Self {
            data_type,
            compressed,
            length,
        })
    }
}

/// Reads the frame header at `offset`, or `None` at exact end of data.
///
/// A header straddling the end of the file, or a payload extending past it,
/// is a corruption error.
fn read_frame_header(
    file: &FileHandle,
    offset: u64,
    data_size: u64,
) -> ExchangeResult<Option<FrameHeader>> {
    if offset == data_size {
        return Ok(None);
    }
    if offset + FRAME_HEADER_BYTES > data_size {
        return Err(ExchangeError::InvalidFrame {
            offset,
            reason: "truncated frame header",
        });
    }

    let mut raw = [0u8; FRAME_HEADER_BYTES as usize];
    file.read_fully(offset, &mut raw)?;
    let header = FrameHeader::decode(&raw, offset)?;

    let payload_end = offset + FRAME_HEADER_BYTES + u64::from(header.length);
    if payload_end > data_size {
        #[allow(clippy::cast_possible_truncation)] // Bounded by header.length, a u32.
        return Err(ExchangeError::TruncatedRead {
            offset: offset + FRAME_HEADER_BYTES,
            expected: header.length,
            found: (data_size - offset - FRAME_HEADER_BYTES) as u32,
        });
    }

    Ok(Some(header))
}

struct WriteState {
    offset: u64,
    units: u32,
}

struct StoreShared {
    id: SubpartitionId,
    path: PathBuf,
    file: Arc<FileHandle>,
    config: StoreConfig,
    write: Mutex<WriteState>,
    sealed: AtomicBool,
    closed: AtomicBool,
}

/// A write-once, read-many spill store for one bounded subpartition.
pub struct BoundedStore {
    shared: Arc<StoreShared>,
}

impl BoundedStore {
    /// Creates an empty store backed by a new spill file at `path`.
    ///
    /// # Panics
    /// Panics if the configuration is invalid (programmer error).
    ///
    /// # Errors
    /// Returns an error if the spill file cannot be created.
    pub fn create(
        id: SubpartitionId,
        path: &Path,
        config: StoreConfig,
    ) -> ExchangeResult<Self> {
        config.validate().expect("invalid store config");

        let file = FileHandle::create(path)?;
        debug!(%id, path = %path.display(), "created bounded store");

        Ok(Self {
            shared: Arc::new(StoreShared {
                id,
                path: path.to_path_buf(),
                file: Arc::new(file),
                config,
                write: Mutex::new(WriteState { offset: 0, units: 0 }),
                sealed: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the subpartition this store belongs to.
    #[must_use]
    pub fn id(&self) -> SubpartitionId {
        self.shared.id
    }

    /// Appends one length-prefixed frame.
    ///
    /// # Panics
    /// Panics if the store is sealed or closed, or if `data_type` is `None`
    /// (programmer errors).
    ///
    /// # Errors
    /// Returns [`ExchangeError::UnitTooLarge`] for payloads no read segment
    /// could stage, or an I/O error if the write fails.
    pub fn write_unit(
        &self,
        data_type: DataType,
        compressed: bool,
        payload: &[u8],
    ) -> ExchangeResult<()> {
        assert!(!data_type.is_none(), "a unit must carry data or an event");
        assert!(
            !self.shared.sealed.load(Ordering::SeqCst),
            "cannot write to a sealed store"
        );
        assert!(
            !self.shared.closed.load(Ordering::SeqCst),
            "cannot write to a closed store"
        );

        if payload.len() > self.shared.config.segment_bytes as usize {
            #[allow(clippy::cast_possible_truncation)] // Reported size saturates at u32::MAX.
            return Err(ExchangeError::UnitTooLarge {
                size: payload.len().min(u32::MAX as usize) as u32,
                max: self.shared.config.segment_bytes,
            });
        }

        #[allow(clippy::cast_possible_truncation)] // Checked against segment_bytes above.
        let header = FrameHeader {
            data_type,
            compressed,
            length: payload.len() as u32,
        };

        let mut frame = BytesMut::with_capacity(FRAME_HEADER_BYTES as usize + payload.len());
        header.encode(&mut frame);
        frame.put_slice(payload);

        let mut write = self.shared.write.lock().expect("write lock poisoned");
        self.shared.file.write_at(write.offset, &frame)?;
        write.offset += frame.len() as u64;
        write.units += 1;
        Ok(())
    }

    /// Seals the store: flushes, forbids further writes, permits readers.
    ///
    /// # Panics
    /// Panics if the store is already sealed (programmer error).
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn finish_write(&self) -> ExchangeResult<()> {
        let was_sealed = self.shared.sealed.swap(true, Ordering::SeqCst);
        assert!(!was_sealed, "store already sealed");

        self.shared.file.sync()?;

        let write = self.shared.write.lock().expect("write lock poisoned");
        debug!(
            id = %self.shared.id,
            units = write.units,
            bytes = write.offset,
            "sealed bounded store"
        );
        Ok(())
    }

    /// Returns true once the store is sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.shared.sealed.load(Ordering::SeqCst)
    }

    /// Returns the number of units written so far.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.shared.write.lock().expect("write lock poisoned").units
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.shared.write.lock().expect("write lock poisoned").offset
    }

    /// Opens a sequential cursor over the sealed store.
    ///
    /// If a listener is supplied, every recycle of a pooled segment
    /// re-notifies it, unless the reader has already reached end-of-stream.
    ///
    /// # Panics
    /// Panics if the store is not sealed yet: serving regions of an
    /// in-progress spill is unsupported by contract (programmer error).
    ///
    /// # Errors
    /// Returns [`ExchangeError::Released`] if the store is closed, or an I/O
    /// error if priming the first frame header fails.
    pub fn create_reader(
        &self,
        listener: Option<Arc<dyn AvailabilityListener>>,
    ) -> ExchangeResult<BoundedReader> {
        assert!(
            self.shared.sealed.load(Ordering::SeqCst),
            "bounded store must be sealed before reading"
        );
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ExchangeError::Released {
                operation: "create_reader",
            });
        }

        let (data_size, total_units) = {
            let write = self.shared.write.lock().expect("write lock poisoned");
            (write.offset, write.units)
        };

        let peeked = read_frame_header(&self.shared.file, 0, data_size)?;

        trace!(
            id = %self.shared.id,
            units = total_units,
            read_segments = self.shared.config.read_segments,
            "opened bounded reader"
        );

        Ok(BoundedReader {
            shared: Arc::new(ReaderShared {
                store: Arc::clone(&self.shared),
                pool: SegmentPool::new(
                    self.shared.config.read_segments,
                    self.shared.config.segment_bytes,
                ),
                finished: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                listener,
            }),
            cursor: Mutex::new(ReaderCursor {
                next_offset: 0,
                units_read: 0,
                peeked,
            }),
            data_size,
            total_units,
        })
    }

    /// Opens the consumer-side view over the sealed store.
    ///
    /// Notifies the listener immediately: a sealed store with data is
    /// available by definition.
    ///
    /// # Panics
    /// Panics if the store is not sealed yet (programmer error).
    ///
    /// # Errors
    /// Returns [`ExchangeError::Released`] if the store is closed, or an I/O
    /// error from reader creation.
    pub fn create_view(
        &self,
        listener: Arc<dyn AvailabilityListener>,
    ) -> ExchangeResult<BoundedStoreView> {
        let reader = self.create_reader(Some(Arc::clone(&listener)))?;

        if reader.total_units > 0 {
            listener.notify_data_available();
        }

        Ok(BoundedStoreView {
            reader,
            listener,
            released: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            failure: Mutex::new(None),
        })
    }

    /// Closes the store and removes the spill file.
    ///
    /// Idempotent. Reads racing this close fail with a cancellation-class
    /// error rather than corrupting state.
    ///
    /// # Errors
    /// Returns an error if the spill file cannot be removed.
    pub fn close(&self) -> ExchangeResult<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!(id = %self.shared.id, path = %self.shared.path.display(), "closed bounded store");

        match std::fs::remove_file(&self.shared.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExchangeError::io("remove", e)),
        }
    }

    /// Returns true once the store is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for BoundedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedStore")
            .field("id", &self.shared.id)
            .field("path", &self.shared.path)
            .field("sealed", &self.shared.sealed.load(Ordering::SeqCst))
            .field("closed", &self.shared.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Outcome of one reader step.
#[derive(Debug)]
pub enum ReadResult {
    /// The next unit.
    Unit(PartitionData),
    /// All scratch segments are in flight. Retry after a recycle
    /// notification.
    NotYet,
    /// The store is fully consumed.
    Finished,
}

/// State shared between a reader and the recycle hooks of its outstanding
/// units.
struct ReaderShared {
    store: Arc<StoreShared>,
    pool: SegmentPool,
    finished: AtomicBool,
    closed: AtomicBool,
    listener: Option<Arc<dyn AvailabilityListener>>,
}

impl ReaderShared {
    fn is_terminal(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
            || self.closed.load(Ordering::SeqCst)
            || self.store.closed.load(Ordering::SeqCst)
    }
}

impl BufferRecycler for ReaderShared {
    fn recycle(&self, backing: BufferBacking) {
        // Return the segment before waking anyone: a notified consumer must
        // find a free segment.
        if let BufferBacking::Segment(segment) = backing {
            self.pool.release(segment);
        }

        if self.is_terminal() {
            trace!(id = %self.store.id, "suppressing recycle notification after terminal state");
            return;
        }
        if let Some(listener) = &self.listener {
            listener.notify_data_available();
        }
    }
}

struct ReaderCursor {
    next_offset: u64,
    units_read: u32,
    /// Header of the next frame, pre-read so availability queries stay
    /// I/O-free. `None` means the cursor stands at end of data.
    peeked: Option<FrameHeader>,
}

/// A sequential cursor over a sealed [`BoundedStore`] with bounded
/// read-ahead.
pub struct BoundedReader {
    shared: Arc<ReaderShared>,
    cursor: Mutex<ReaderCursor>,
    data_size: u64,
    total_units: u32,
}

impl BoundedReader {
    /// Reads the next unit, staged through a pooled scratch segment.
    ///
    /// Non-blocking: with all segments held by not-yet-recycled units this
    /// returns [`ReadResult::NotYet`] and the caller retries after an
    /// availability notification. End-of-stream is tagged on the attempt
    /// that finds no further frame, never earlier.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Released`] when racing a close, a
    /// corruption-class error on short reads, or an I/O error.
    pub fn next_unit(&self) -> ExchangeResult<ReadResult> {
        if self.is_closed() {
            return Err(ExchangeError::Released {
                operation: "next_unit",
            });
        }
        if self.shared.finished.load(Ordering::SeqCst) {
            return Ok(ReadResult::Finished);
        }

        let Some(segment) = self.shared.pool.acquire() else {
            return Ok(ReadResult::NotYet);
        };

        let mut cursor = self.cursor.lock().expect("cursor lock poisoned");

        let Some(header) = cursor.peeked.take() else {
            // End of stream: from here on, recycles stay silent.
            self.shared.finished.store(true, Ordering::SeqCst);
            drop(cursor);
            self.shared.pool.release(segment);
            trace!(id = %self.shared.store.id, "bounded reader reached end of stream");
            return Ok(ReadResult::Finished);
        };

        if header.length > self.shared.pool.segment_bytes() {
            let offset = cursor.next_offset;
            cursor.peeked = Some(header);
            drop(cursor);
            self.shared.pool.release(segment);
            return Err(ExchangeError::InvalidFrame {
                offset,
                reason: "frame exceeds segment capacity",
            });
        }

        let mut segment = segment;
        let payload_offset = cursor.next_offset + FRAME_HEADER_BYTES;
        if let Err(e) = self.shared.store.file.read_fully(
            payload_offset,
            &mut segment.as_mut_slice()[..header.length as usize],
        ) {
            cursor.peeked = Some(header);
            drop(cursor);
            self.shared.pool.release(segment);
            return Err(e);
        }

        cursor.next_offset = payload_offset + u64::from(header.length);
        cursor.units_read += 1;
        let sequence_number = cursor.units_read - 1;

        cursor.peeked =
            match read_frame_header(&self.shared.store.file, cursor.next_offset, self.data_size) {
                Ok(peeked) => peeked,
                Err(e) => {
                    drop(cursor);
                    self.shared.pool.release(segment);
                    return Err(e);
                }
            };

        let next_data_type = cursor
            .peeked
            .map_or(DataType::None, |header| header.data_type);
        let backlog = self.total_units - cursor.units_read;
        drop(cursor);

        let buffer = Buffer::pooled(
            segment,
            header.length,
            header.data_type,
            header.compressed,
            Some(Arc::clone(&self.shared) as Arc<dyn BufferRecycler>),
        );

        Ok(ReadResult::Unit(PartitionData::Buffer {
            buffer,
            backlog,
            next_data_type,
            sequence_number,
        }))
    }

    /// Reads the next unit as a zero-copy file-region descriptor.
    ///
    /// Skips the segment pool entirely - no bytes are staged, so this never
    /// returns [`ReadResult::NotYet`]; boundedness is the transport's
    /// concern on this path.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Released`] when racing a close, or a
    /// corruption-class error on an invalid frame.
    pub fn next_region(&self) -> ExchangeResult<ReadResult> {
        if self.is_closed() {
            return Err(ExchangeError::Released {
                operation: "next_region",
            });
        }
        if self.shared.finished.load(Ordering::SeqCst) {
            return Ok(ReadResult::Finished);
        }

        let mut cursor = self.cursor.lock().expect("cursor lock poisoned");

        let Some(header) = cursor.peeked.take() else {
            self.shared.finished.store(true, Ordering::SeqCst);
            trace!(id = %self.shared.store.id, "bounded reader reached end of stream");
            return Ok(ReadResult::Finished);
        };

        let payload_offset = cursor.next_offset + FRAME_HEADER_BYTES;
        cursor.next_offset = payload_offset + u64::from(header.length);
        cursor.units_read += 1;
        let sequence_number = cursor.units_read - 1;

        cursor.peeked =
            read_frame_header(&self.shared.store.file, cursor.next_offset, self.data_size)?;

        let next_data_type = cursor
            .peeked
            .map_or(DataType::None, |header| header.data_type);
        let backlog = self.total_units - cursor.units_read;

        Ok(ReadResult::Unit(PartitionData::FileRegion {
            file: Arc::clone(&self.shared.store.file),
            offset: payload_offset,
            size: header.length,
            data_type: header.data_type,
            compressed: header.compressed,
            backlog,
            next_data_type,
            sequence_number,
        }))
    }

    /// Returns the data type of the next unit, or `None` at end of data.
    ///
    /// I/O-free: the header was pre-read while producing the previous unit.
    #[must_use]
    pub fn next_data_type(&self) -> DataType {
        self.cursor
            .lock()
            .expect("cursor lock poisoned")
            .peeked
            .map_or(DataType::None, |header| header.data_type)
    }

    /// Returns true if a scratch segment is free for the next staged read.
    #[must_use]
    pub fn has_free_segment(&self) -> bool {
        self.shared.pool.available() > 0
    }

    /// Best-effort count of units not yet returned.
    #[must_use]
    pub fn units_remaining(&self) -> u32 {
        let units_read = self
            .cursor
            .lock()
            .expect("cursor lock poisoned")
            .units_read;
        self.total_units - units_read
    }

    /// Returns true once the reader has observed end-of-stream.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    /// Closes the reader.
    ///
    /// Idempotent. Outstanding buffers return their segments on recycle as
    /// usual, but no further notification fires.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(id = %self.shared.store.id, "closed bounded reader");
    }

    /// Returns true once the reader or its store is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
            || self.shared.store.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for BoundedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedReader")
            .field("id", &self.shared.store.id)
            .field("total_units", &self.total_units)
            .field("finished", &self.shared.finished.load(Ordering::SeqCst))
            .field("closed", &self.shared.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Consumer-side cursor over a sealed [`BoundedStore`].
pub struct BoundedStoreView {
    reader: BoundedReader,
    listener: Arc<dyn AvailabilityListener>,
    released: AtomicBool,
    paused: AtomicBool,
    failure: Mutex<Option<ExchangeError>>,
}

impl BoundedStoreView {
    fn record_failure(&self, error: &ExchangeError) {
        *self.failure.lock().expect("failure lock poisoned") = Some(error.clone());
    }
}

impl SubpartitionView for BoundedStoreView {
    fn poll_next(&self) -> ExchangeResult<Poll> {
        if self.released.load(Ordering::SeqCst) {
            return Err(ExchangeError::Released {
                operation: "poll_next",
            });
        }

        // Data is withheld while paused; events keep flowing.
        let next = self.reader.next_data_type();
        if next.is_buffer() && self.paused.load(Ordering::SeqCst) {
            return Ok(Poll::NotYet);
        }

        let unit = match self.reader.next_unit() {
            Ok(ReadResult::Unit(unit)) => unit,
            Ok(ReadResult::NotYet) => return Ok(Poll::NotYet),
            Ok(ReadResult::Finished) => return Ok(Poll::Finished),
            Err(e) => {
                self.record_failure(&e);
                return Err(e);
            }
        };

        let backlog = unit.backlog();
        let next_data_type = unit.next_data_type();

        if !unit.is_buffer() {
            self.paused.store(true, Ordering::SeqCst);
        }
        let paused = self.paused.load(Ordering::SeqCst);

        let data_available =
            !next_data_type.is_none() && (next_data_type.is_event() || !paused);
        let event_available = next_data_type.is_event();

        match unit {
            PartitionData::Buffer { buffer, .. } => Ok(Poll::Ready(RawMessage::buffer(
                buffer,
                data_available,
                event_available,
                backlog,
            ))),
            PartitionData::FileRegion {
                file,
                offset,
                size,
                data_type,
                compressed,
                ..
            } => Ok(Poll::Ready(RawMessage::file_region(
                file,
                offset,
                size,
                data_type,
                compressed,
                data_available,
                event_available,
                backlog,
            ))),
        }
    }

    fn notify_data_available(&self) {
        self.listener.notify_data_available();
    }

    fn is_available(&self, credits: u32) -> bool {
        if self.released.load(Ordering::SeqCst) || self.reader.is_closed() {
            return false;
        }

        let next = self.reader.next_data_type();
        if next.is_none() || !self.reader.has_free_segment() {
            return false;
        }

        if credits == 0 {
            return next.is_event();
        }
        next.is_event() || !self.paused.load(Ordering::SeqCst)
    }

    fn resume_consumption(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn release_all_resources(&self) -> ExchangeResult<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.reader.close();
        debug!(id = %self.reader.shared.store.id, "released bounded store view");
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst) || self.reader.is_closed()
    }

    fn failure_cause(&self) -> Option<ExchangeError> {
        self.failure.lock().expect("failure lock poisoned").clone()
    }

    fn queued_unit_count(&self) -> u32 {
        self.reader.units_remaining()
    }

    fn data_backlog(&self) -> u32 {
        self.reader.units_remaining()
    }
}

impl std::fmt::Debug for BoundedStoreView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedStoreView")
            .field("reader", &self.reader)
            .field("released", &self.released.load(Ordering::SeqCst))
            .field("paused", &self.paused.load(Ordering::SeqCst))
            .finish()
    }
}

//! Pooled memory segments for staging disk reads.
//!
//! A [`MemorySegment`] is a fixed-capacity scratch buffer. A [`SegmentPool`]
//! is a bounded free-list of segments: its capacity equals the maximum number
//! of concurrently in-flight (read but not yet recycled) units, which is how
//! a slow consumer back-pressures disk reads without blocking any thread.

use std::sync::Mutex;

/// A fixed-capacity reusable scratch buffer.
///
/// Segments are owned by exactly one party at a time: the pool, a reader
/// performing a staged read, or the buffer delivered downstream. Ownership
/// moves with the value; there is no sharing.
pub struct MemorySegment {
    buf: Box<[u8]>,
}

impl MemorySegment {
    /// Allocates a segment with the given capacity in bytes.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "segment capacity must be positive");
        Self {
            buf: vec![0u8; capacity as usize].into_boxed_slice(),
        }
    }

    /// Returns the segment capacity in bytes.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Capacity was created from a u32.
    pub fn capacity(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Returns the segment contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the segment contents for writing.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl std::fmt::Debug for MemorySegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySegment")
            .field("capacity", &self.buf.len())
            .finish()
    }
}

/// A bounded, non-blocking free-list of memory segments.
///
/// All segments are allocated up front. [`SegmentPool::acquire`] never
/// blocks: when every segment is in flight it returns `None` and the caller
/// must retry after a recycle notification.
///
/// Acquire and release may race from arbitrary threads (a release typically
/// runs on a downstream consumer thread via a buffer recycle hook).
pub struct SegmentPool {
    free: Mutex<Vec<MemorySegment>>,
    num_segments: u32,
    segment_bytes: u32,
}

impl SegmentPool {
    /// Creates a pool of `num_segments` segments of `segment_bytes` each.
    ///
    /// # Panics
    /// Panics if `num_segments` or `segment_bytes` is zero.
    #[must_use]
    pub fn new(num_segments: u32, segment_bytes: u32) -> Self {
        assert!(num_segments > 0, "pool must hold at least one segment");
        assert!(segment_bytes > 0, "segment capacity must be positive");

        let free = (0..num_segments)
            .map(|_| MemorySegment::new(segment_bytes))
            .collect();

        Self {
            free: Mutex::new(free),
            num_segments,
            segment_bytes,
        }
    }

    /// Takes a free segment, or returns `None` when all are in flight.
    #[must_use]
    pub fn acquire(&self) -> Option<MemorySegment> {
        self.free.lock().expect("segment pool lock poisoned").pop()
    }

    /// Returns a segment to the free-list.
    pub fn release(&self, segment: MemorySegment) {
        debug_assert_eq!(
            segment.capacity(),
            self.segment_bytes,
            "foreign segment returned to pool"
        );

        let mut free = self.free.lock().expect("segment pool lock poisoned");
        debug_assert!(
            free.len() < self.num_segments as usize,
            "segment released twice"
        );
        free.push(segment);
    }

    /// Returns the number of currently free segments.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Free-list length is bounded by num_segments.
    pub fn available(&self) -> u32 {
        self.free.lock().expect("segment pool lock poisoned").len() as u32
    }

    /// Returns the total number of segments in the pool.
    #[must_use]
    pub const fn num_segments(&self) -> u32 {
        self.num_segments
    }

    /// Returns the capacity of each segment in bytes.
    #[must_use]
    pub const fn segment_bytes(&self) -> u32 {
        self.segment_bytes
    }
}

impl std::fmt::Debug for SegmentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentPool")
            .field("num_segments", &self.num_segments)
            .field("segment_bytes", &self.segment_bytes)
            .field("available", &self.available())
            .finish()
    }
}

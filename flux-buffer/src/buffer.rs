//! Recyclable buffer handles.
//!
//! A [`Buffer`] is the unit of data handed from the exchange to the
//! transport. It is a reference-counted handle: clones share the same
//! underlying bytes, and the recycle hook fires exactly once, when the last
//! handle goes away. Release consumes the handle by value, so a double
//! release of one handle does not compile.
//!
//! The hook is the sole backpressure-release mechanism of the read path:
//! recycling a pooled segment is what re-arms a stalled reader. Whether the
//! hook actually notifies anyone is the recycler's decision (a terminal
//! reader suppresses the notification).

use std::sync::Arc;

use bytes::Bytes;

use crate::data_type::DataType;
use crate::segment::MemorySegment;

/// The memory backing a buffer.
pub enum BufferBacking {
    /// Heap-resident bytes from the pipelined (in-memory) path.
    Heap(Bytes),
    /// A pooled scratch segment from the staged file-read path.
    Segment(MemorySegment),
}

impl std::fmt::Debug for BufferBacking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heap(bytes) => f.debug_tuple("Heap").field(&bytes.len()).finish(),
            Self::Segment(segment) => f.debug_tuple("Segment").field(segment).finish(),
        }
    }
}

/// Recycle hook invoked exactly once when the last handle to a buffer drops.
///
/// Implementations must tolerate invocation from an arbitrary thread: the
/// final handle is typically dropped by a downstream consumer or an I/O
/// completion, never by the thread that created the buffer.
pub trait BufferRecycler: Send + Sync {
    /// Takes back the buffer's backing memory.
    ///
    /// Pooled readers return the segment to their free-list and re-notify
    /// their availability listener unless they already reached a terminal
    /// state. Heap backings carry no reusable memory; the hook then only
    /// serves as the notification trigger.
    fn recycle(&self, backing: BufferBacking);
}

struct BufferInner {
    backing: Option<BufferBacking>,
    len: u32,
    data_type: DataType,
    compressed: bool,
    recycler: Option<Arc<dyn BufferRecycler>>,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Some(recycler) = self.recycler.take() {
            let backing = self.backing.take().expect("backing present until drop");
            recycler.recycle(backing);
        }
    }
}

/// A reference-counted, recycle-once handle over an owned memory region.
///
/// Cloning increments the reference count; every clone must be released
/// exactly once (explicitly via [`Buffer::recycle`], or implicitly by drop).
/// The recycle hook fires when the final handle is released, never earlier
/// and never twice.
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    /// Creates a heap-backed buffer with no recycle hook.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Payload sizes are bounded by system limits.
    pub fn from_bytes(payload: Bytes, data_type: DataType, compressed: bool) -> Self {
        let len = payload.len() as u32;
        Self {
            inner: Arc::new(BufferInner {
                backing: Some(BufferBacking::Heap(payload)),
                len,
                data_type,
                compressed,
                recycler: None,
            }),
        }
    }

    /// Creates a heap-backed buffer whose recycle hook fires when the last
    /// handle drops.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Payload sizes are bounded by system limits.
    pub fn with_recycler(
        payload: Bytes,
        data_type: DataType,
        compressed: bool,
        recycler: Arc<dyn BufferRecycler>,
    ) -> Self {
        let len = payload.len() as u32;
        Self {
            inner: Arc::new(BufferInner {
                backing: Some(BufferBacking::Heap(payload)),
                len,
                data_type,
                compressed,
                recycler: Some(recycler),
            }),
        }
    }

    /// Creates a buffer over the first `len` bytes of a filled scratch
    /// segment.
    ///
    /// With a recycler, the segment returns to its pool when the last handle
    /// drops. Without one, the segment is simply freed - the policy used when
    /// a file region is materialized into caller-owned scratch memory.
    ///
    /// # Panics
    /// Panics if `len` exceeds the segment capacity.
    #[must_use]
    pub fn pooled(
        segment: MemorySegment,
        len: u32,
        data_type: DataType,
        compressed: bool,
        recycler: Option<Arc<dyn BufferRecycler>>,
    ) -> Self {
        assert!(
            len <= segment.capacity(),
            "buffer length exceeds segment capacity"
        );
        Self {
            inner: Arc::new(BufferInner {
                backing: Some(BufferBacking::Segment(segment)),
                len,
                data_type,
                compressed,
                recycler,
            }),
        }
    }

    /// Returns the readable payload.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        let backing = self
            .inner
            .backing
            .as_ref()
            .expect("backing present until drop");
        match backing {
            BufferBacking::Heap(bytes) => &bytes[..],
            BufferBacking::Segment(segment) => &segment.as_slice()[..self.inner.len as usize],
        }
    }

    /// Returns the number of readable bytes.
    #[must_use]
    pub fn readable_bytes(&self) -> u32 {
        self.inner.len
    }

    /// Returns the unit's data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.inner.data_type
    }

    /// Returns true if this is a raw-data unit (as opposed to an event).
    #[must_use]
    pub fn is_buffer(&self) -> bool {
        self.inner.data_type.is_buffer()
    }

    /// Returns true if this is a control-event unit.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.inner.data_type.is_event()
    }

    /// Returns true if the payload is compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.inner.compressed
    }

    /// Releases this handle.
    ///
    /// Consumes the handle, making a second release of the same handle
    /// unrepresentable. The recycle hook fires when the last outstanding
    /// handle (this one included) has been released.
    pub fn recycle(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.inner.len)
            .field("data_type", &self.inner.data_type)
            .field("compressed", &self.inner.compressed)
            .field("hooked", &self.inner.recycler.is_some())
            .finish()
    }
}

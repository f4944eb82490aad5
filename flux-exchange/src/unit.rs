//! Partition data units.
//!
//! A [`PartitionData`] is one retrievable chunk of a subpartition, in
//! whichever form its storage medium produced it: an already-resident buffer
//! (pipelined exchange, staged file read) or a file-region descriptor
//! (bounded blocking exchange, zero-copy path). Both variants answer the same
//! questions - data type, sequence, backlog - and convert themselves into the
//! matching outbound message shape, so the poll loop never inspects storage
//! types at the call site.

use std::sync::Arc;

use flux_buffer::{Buffer, DataType, MemorySegment};
use flux_core::ReceiverId;

use crate::error::ExchangeResult;
use crate::file::FileHandle;
use crate::message::WireMessage;

/// One retrievable unit of a subpartition.
#[derive(Debug)]
pub enum PartitionData {
    /// A unit whose payload is already resident in memory.
    Buffer {
        /// The payload.
        buffer: Buffer,
        /// Advisory count of units queued behind this one.
        backlog: u32,
        /// Data type of the unit that follows, or `None` at the tail.
        next_data_type: DataType,
        /// Position of this unit in the subpartition.
        sequence_number: u32,
    },

    /// A unit stored as a region of a sealed spill file.
    FileRegion {
        /// The spill file.
        file: Arc<FileHandle>,
        /// Byte offset of the payload within the file.
        offset: u64,
        /// Payload length in bytes.
        size: u32,
        /// Payload kind.
        data_type: DataType,
        /// True if the payload is compressed.
        compressed: bool,
        /// Advisory count of units queued behind this one.
        backlog: u32,
        /// Data type of the unit that follows, or `None` at the tail.
        next_data_type: DataType,
        /// Position of this unit in the subpartition.
        sequence_number: u32,
    },
}

impl PartitionData {
    /// Returns true if this unit carries raw data (as opposed to an event).
    #[must_use]
    pub fn is_buffer(&self) -> bool {
        match self {
            Self::Buffer { buffer, .. } => buffer.is_buffer(),
            Self::FileRegion { data_type, .. } => data_type.is_buffer(),
        }
    }

    /// Returns the data type of the unit that follows this one.
    #[must_use]
    pub const fn next_data_type(&self) -> DataType {
        match self {
            Self::Buffer { next_data_type, .. } | Self::FileRegion { next_data_type, .. } => {
                *next_data_type
            }
        }
    }

    /// Returns this unit's position in the subpartition.
    #[must_use]
    pub const fn sequence_number(&self) -> u32 {
        match self {
            Self::Buffer {
                sequence_number, ..
            }
            | Self::FileRegion {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    /// Returns the advisory backlog snapshot.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        match self {
            Self::Buffer { backlog, .. } | Self::FileRegion { backlog, .. } => *backlog,
        }
    }

    /// Turns this unit into a resident [`Buffer`].
    ///
    /// The buffer variant returns its payload as-is and ignores any supplied
    /// scratch memory. The file-region variant reads exactly `size` bytes
    /// into the supplied segment - a short read is a corruption error, never
    /// a retry condition - and wraps the filled segment as a buffer that owns
    /// the scratch memory (nothing is recycled back to the file).
    ///
    /// # Panics
    /// Panics if a file-region unit is materialized without a scratch
    /// segment, or with one too small for the payload.
    ///
    /// # Errors
    /// Returns an error if the file read fails or comes up short.
    pub fn materialize(self, segment: Option<MemorySegment>) -> ExchangeResult<Buffer> {
        match self {
            Self::Buffer { buffer, .. } => Ok(buffer),
            Self::FileRegion {
                file,
                offset,
                size,
                data_type,
                compressed,
                ..
            } => {
                let mut segment =
                    segment.expect("file-region materialize requires a scratch segment");
                assert!(
                    segment.capacity() >= size,
                    "scratch segment too small for file region"
                );

                file.read_fully(offset, &mut segment.as_mut_slice()[..size as usize])?;
                Ok(Buffer::pooled(segment, size, data_type, compressed, None))
            }
        }
    }

    /// Converts this unit into its outbound message shape.
    ///
    /// Terminal: the unit is consumed. Buffer-backed units become in-place
    /// payload responses; file-region units become zero-copy transfer
    /// descriptors.
    ///
    /// # Errors
    /// Returns an error if the file size cannot be read.
    pub fn build_message(self, receiver_id: ReceiverId) -> ExchangeResult<WireMessage> {
        match self {
            Self::Buffer {
                buffer,
                backlog,
                sequence_number,
                ..
            } => Ok(WireMessage::BufferResponse {
                receiver_id,
                sequence_number,
                backlog,
                data_type: buffer.data_type(),
                compressed: buffer.is_compressed(),
                length: buffer.readable_bytes(),
                buffer,
            }),
            Self::FileRegion {
                file,
                offset,
                size,
                data_type,
                compressed,
                backlog,
                sequence_number,
                ..
            } => {
                let file_size = file.size()?;
                Ok(WireMessage::FileRegionResponse {
                    receiver_id,
                    sequence_number,
                    backlog,
                    data_type,
                    compressed,
                    file,
                    offset,
                    size,
                    file_size,
                })
            }
        }
    }
}

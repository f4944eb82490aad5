//! Outbound message shapes.
//!
//! These are the two forms a polled unit takes on its way to the network
//! stack. Byte-level framing onto a socket is the transport's concern; the
//! exchange only decides the shape:
//!
//! - [`WireMessage::BufferResponse`] carries the payload in place. The buffer
//!   itself rides in the message so the transport's final write-then-drop is
//!   what recycles it.
//! - [`WireMessage::FileRegionResponse`] describes a zero-copy transfer: the
//!   transport moves `(offset, size)` straight from the file handle to the
//!   socket without staging through application memory.

use std::sync::Arc;

use flux_buffer::{Buffer, DataType};
use flux_core::ReceiverId;

use crate::file::FileHandle;

/// A flow-controlled response addressed to one consumer input channel.
#[derive(Debug)]
pub enum WireMessage {
    /// An in-place payload response.
    BufferResponse {
        /// The input channel this response is addressed to.
        receiver_id: ReceiverId,
        /// Position of this unit in the (subpartition, consumer) stream.
        sequence_number: u32,
        /// Advisory count of units queued behind this one.
        backlog: u32,
        /// Payload kind.
        data_type: DataType,
        /// True if the payload is compressed.
        compressed: bool,
        /// Payload length in bytes.
        length: u32,
        /// The payload; recycled when the transport drops it after writing.
        buffer: Buffer,
    },

    /// A zero-copy file-region response.
    FileRegionResponse {
        /// The input channel this response is addressed to.
        receiver_id: ReceiverId,
        /// Position of this unit in the (subpartition, consumer) stream.
        sequence_number: u32,
        /// Advisory count of units queued behind this one.
        backlog: u32,
        /// Payload kind.
        data_type: DataType,
        /// True if the payload is compressed.
        compressed: bool,
        /// The spill file to transfer from.
        file: Arc<FileHandle>,
        /// Byte offset of the payload within the file.
        offset: u64,
        /// Payload length in bytes.
        size: u32,
        /// Total file size observed when the message was built.
        file_size: u64,
    },
}

impl WireMessage {
    /// Returns the input channel this response is addressed to.
    #[must_use]
    pub const fn receiver_id(&self) -> ReceiverId {
        match self {
            Self::BufferResponse { receiver_id, .. }
            | Self::FileRegionResponse { receiver_id, .. } => *receiver_id,
        }
    }

    /// Returns the sequence number of the carried unit.
    #[must_use]
    pub const fn sequence_number(&self) -> u32 {
        match self {
            Self::BufferResponse {
                sequence_number, ..
            }
            | Self::FileRegionResponse {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    /// Returns the advisory backlog snapshot.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        match self {
            Self::BufferResponse { backlog, .. } | Self::FileRegionResponse { backlog, .. } => {
                *backlog
            }
        }
    }

    /// Returns the payload kind.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::BufferResponse { data_type, .. }
            | Self::FileRegionResponse { data_type, .. } => *data_type,
        }
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub const fn length(&self) -> u32 {
        match self {
            Self::BufferResponse { length, .. } => *length,
            Self::FileRegionResponse { size, .. } => *size,
        }
    }
}

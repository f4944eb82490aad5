//! Subpartition views.
//!
//! A [`SubpartitionView`] is the per-consumer-connection cursor over one
//! subpartition. The server thread polls it for [`RawMessage`]s; everything
//! else - availability queries, backpressure resume, release - hangs off the
//! same contract, so the server never cares whether the subpartition lives in
//! memory or on disk.
//!
//! # Threading
//!
//! One thread polls ([`SubpartitionView::poll_next`] and
//! [`SubpartitionView::is_available`] are not reentrant and must be invoked
//! by exactly one thread at a time per view). Notification and release may be
//! called from any thread, concurrently with polling, and are idempotent.
//! Backlog and queue counters are intentionally read without synchronization:
//! advisory only, never used for correctness decisions.

use std::sync::Arc;

use flux_buffer::{Buffer, DataType};
use flux_core::ReceiverId;

use crate::error::{ExchangeError, ExchangeResult};
use crate::file::FileHandle;
use crate::message::WireMessage;

/// Outcome of one poll.
///
/// "Not yet" and "finished" are deliberately distinct: a pipelined producer
/// being slow and a drained bounded store are different facts, and collapsing
/// them into one null-like sentinel is how consumers stall forever.
#[derive(Debug)]
pub enum Poll {
    /// A unit is ready; the snapshot rides along.
    Ready(RawMessage),
    /// Nothing is ready yet. Retry after an availability notification.
    NotYet,
    /// The subpartition is fully consumed. No further unit will ever appear.
    Finished,
}

/// Per-consumer cursor over one subpartition.
pub trait SubpartitionView: Send + Sync {
    /// Polls the next unit.
    ///
    /// Returning [`Poll::NotYet`] means *not yet produced* (or staged),
    /// never end-of-stream; end-of-stream is [`Poll::Finished`].
    ///
    /// # Errors
    /// Returns an I/O-class error on read failure; the same error is then
    /// available via [`SubpartitionView::failure_cause`].
    fn poll_next(&self) -> ExchangeResult<Poll>;

    /// Wakes a polling consumer.
    ///
    /// Callable from any thread (producer thread or a recycle hook).
    /// Spurious wake-ups are harmless because the poll re-checks real state.
    fn notify_data_available(&self);

    /// Reports whether a poll would find something, under the credit rule.
    ///
    /// With `credits > 0`, reports whether a unit is ready. With
    /// `credits == 0`, reports only whether a control-event unit is ready -
    /// events are exempt from credit gating, data is not.
    fn is_available(&self, credits: u32) -> bool;

    /// Clears the paused state after new credits are granted.
    fn resume_consumption(&self);

    /// Releases the underlying store/view state.
    ///
    /// Idempotent: subsequent calls are no-ops.
    ///
    /// # Errors
    /// Returns an error if releasing the underlying resources fails.
    fn release_all_resources(&self) -> ExchangeResult<()>;

    /// Returns true once resources have been released.
    fn is_released(&self) -> bool;

    /// Returns the last fatal error, if any.
    fn failure_cause(&self) -> Option<ExchangeError>;

    /// Best-effort count of units currently queued. Monitoring only.
    fn queued_unit_count(&self) -> u32;

    /// Best-effort count of data units queued. Credit sizing only.
    fn data_backlog(&self) -> u32;
}

/// The payload a raw message carries.
#[derive(Debug)]
enum RawPayload {
    /// A resident buffer.
    Buffer(Buffer),
    /// A region of a sealed spill file.
    FileRegion {
        file: Arc<FileHandle>,
        offset: u64,
        size: u32,
        data_type: DataType,
        compressed: bool,
    },
}

/// A transient, per-poll snapshot of one unit plus the availability state
/// observed at production time.
///
/// Created per poll, terminal-converted into a wire message, then discarded -
/// never retained or reused.
#[derive(Debug)]
pub struct RawMessage {
    data_available: bool,
    event_available: bool,
    backlog: u32,
    payload: RawPayload,
}

impl RawMessage {
    /// Creates a buffer-resident snapshot.
    #[must_use]
    pub const fn buffer(
        buffer: Buffer,
        data_available: bool,
        event_available: bool,
        backlog: u32,
    ) -> Self {
        Self {
            data_available,
            event_available,
            backlog,
            payload: RawPayload::Buffer(buffer),
        }
    }

    /// Creates a file-region snapshot.
    #[must_use]
    #[allow(clippy::too_many_arguments)] // Mirrors the full region descriptor.
    pub const fn file_region(
        file: Arc<FileHandle>,
        offset: u64,
        size: u32,
        data_type: DataType,
        compressed: bool,
        data_available: bool,
        event_available: bool,
        backlog: u32,
    ) -> Self {
        Self {
            data_available,
            event_available,
            backlog,
            payload: RawPayload::FileRegion {
                file,
                offset,
                size,
                data_type,
                compressed,
            },
        }
    }

    /// Applies the credit rule to the availability snapshot, so the poll
    /// loop can keep draining without a further query.
    #[must_use]
    pub const fn is_more_available(&self, credits: u32) -> bool {
        if credits > 0 {
            self.data_available
        } else {
            self.event_available
        }
    }

    /// Returns true if the carried unit is raw data (as opposed to an
    /// event).
    #[must_use]
    pub fn is_buffer(&self) -> bool {
        match &self.payload {
            RawPayload::Buffer(buffer) => buffer.is_buffer(),
            RawPayload::FileRegion { data_type, .. } => data_type.is_buffer(),
        }
    }

    /// Returns the advisory backlog snapshot.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Converts the snapshot into its wire form. Terminal.
    ///
    /// The file-region form re-reads the current file size, supporting
    /// producer/reader overlap in in-progress spill scenarios - valid only
    /// because regions are only ever served once the corresponding bytes are
    /// fully written.
    ///
    /// # Errors
    /// Returns an error if the file size cannot be read.
    pub fn build_message(
        self,
        receiver_id: ReceiverId,
        sequence_number: u32,
    ) -> ExchangeResult<WireMessage> {
        match self.payload {
            RawPayload::Buffer(buffer) => Ok(WireMessage::BufferResponse {
                receiver_id,
                sequence_number,
                backlog: self.backlog,
                data_type: buffer.data_type(),
                compressed: buffer.is_compressed(),
                length: buffer.readable_bytes(),
                buffer,
            }),
            RawPayload::FileRegion {
                file,
                offset,
                size,
                data_type,
                compressed,
            } => {
                let file_size = file.size()?;
                Ok(WireMessage::FileRegionResponse {
                    receiver_id,
                    sequence_number,
                    backlog: self.backlog,
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

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn data_message(data_available: bool, event_available: bool) -> RawMessage {
        RawMessage::buffer(
            Buffer::from_bytes(Bytes::from_static(b"x"), DataType::DataBuffer, false),
            data_available,
            event_available,
            0,
        )
    }

    #[test]
    fn test_more_available_applies_credit_rule() {
        let message = data_message(true, false);
        assert!(message.is_more_available(1));
        assert!(!message.is_more_available(0));

        let message = data_message(false, true);
        assert!(!message.is_more_available(1));
        assert!(message.is_more_available(0));
    }

    #[test]
    fn test_build_message_buffer_shape() {
        let message = data_message(false, false);
        let wire = message.build_message(ReceiverId::new(3), 11).unwrap();

        assert!(matches!(wire, WireMessage::BufferResponse { .. }));
        assert_eq!(wire.receiver_id(), ReceiverId::new(3));
        assert_eq!(wire.sequence_number(), 11);
        assert_eq!(wire.length(), 1);
    }

    #[test]
    fn test_event_snapshot_is_not_buffer() {
        let message = RawMessage::buffer(
            Buffer::from_bytes(Bytes::new(), DataType::EventBuffer, false),
            false,
            false,
            0,
        );
        assert!(!message.is_buffer());
    }
}

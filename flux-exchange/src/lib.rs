//! Flux Exchange - consumer-side data-plane of the shuffle/exchange service.
//!
//! A network-server thread pulls the next chunk of a task's produced output -
//! from an in-memory buffer queue (pipelined exchange) or a sealed,
//! disk-spilled, zero-copy file region (bounded blocking exchange) - and
//! turns it into a flow-controlled outbound message while tracking backlog
//! for credit-based backpressure.
//!
//! # Components
//!
//! - [`SubpartitionView`]: per-consumer cursor, polymorphic over storage
//! - [`PipelinedSubpartition`]: the in-memory, push-notified variant
//! - [`BoundedStore`] / [`BoundedReader`]: the write-once spill variant with
//!   bounded read-ahead
//! - [`PartitionData`] / [`RawMessage`] / [`WireMessage`]: the unit on its
//!   way from storage to the wire
//!
//! # Control flow
//!
//! ```text
//! producer appends -> subpartition/store tracks availability
//!                  -> server polls SubpartitionView::poll_next
//!                  -> RawMessage::build_message emits the wire form
//!                  -> transport writes and drops, recycling the buffer
//!                  -> the recycle hook re-notifies the view's listener
//!                  -> loop repeats
//! ```
//!
//! There is no blocking wait anywhere in this crate: "not yet available" is
//! always returned immediately, and resumption happens via notification plus
//! caller-driven retry.
//!
//! # `TigerStyle` Principles
//!
//! - Explicit limits on pools, queues, and frames
//! - Misuse panics, races fail cleanly with typed errors
//! - No unsafe code

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod file;
mod message;
mod pipelined;
mod store;
mod unit;
mod view;

pub use error::{ExchangeError, ExchangeResult};
pub use file::FileHandle;
pub use message::WireMessage;
pub use pipelined::{PipelinedSubpartition, PipelinedSubpartitionView};
pub use store::{
    BoundedReader, BoundedStore, BoundedStoreView, ReadResult, StoreConfig, FRAME_HEADER_BYTES,
};
pub use unit::PartitionData;
pub use view::{Poll, RawMessage, SubpartitionView};

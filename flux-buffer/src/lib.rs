//! Flux Buffer - recyclable buffers and pooled memory segments.
//!
//! This crate provides the memory vocabulary of the exchange data-plane:
//!
//! - [`DataType`]: tag distinguishing raw-data units from control-event units
//! - [`MemorySegment`] / [`SegmentPool`]: fixed-capacity reusable scratch
//!   buffers that bound the memory of staged disk reads
//! - [`Buffer`]: a reference-counted, recycle-once handle over bytes, with an
//!   optional recycle hook that fires exactly once when the last handle drops
//! - [`AvailabilityListener`]: the single-callback notification seam that
//!   wakes a polling consumer
//!
//! # Recycle-once contract
//!
//! A [`Buffer`] clone must be released exactly once. Release consumes the
//! handle by value, so releasing the same handle twice does not compile; the
//! recycle hook observes the moment the last clone goes away and never fires
//! twice.
//!
//! # `TigerStyle` Principles
//!
//! - Explicit limits: pool capacity is fixed at construction
//! - No blocking waits: pool acquisition is non-blocking, always
//! - No unsafe code

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod buffer;
mod data_type;
mod listener;
mod segment;

pub use buffer::{Buffer, BufferBacking, BufferRecycler};
pub use data_type::DataType;
pub use listener::{AvailabilityFlag, AvailabilityListener, NotifyListener};
pub use segment::{MemorySegment, SegmentPool};

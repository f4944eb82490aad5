//! Flux Core - Strongly-typed identifiers and limits for the flux exchange
//! service.
//!
//! This crate provides the shared vocabulary of the exchange data-plane:
//! newtype identifiers and explicit system bounds. It carries no I/O and no
//! buffer management - those live in `flux-buffer` and `flux-exchange`.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: Prevent mixing up a `ReceiverId` with a
//!   `SubpartitionId`
//! - **Explicit limits**: Every pool, queue, and frame has a bounded maximum
//! - **Explicit types**: Use u32/u64, not usize
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use types::{ReceiverId, SubpartitionId};

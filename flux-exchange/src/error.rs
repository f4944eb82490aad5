//! Exchange error types.
//!
//! All errors are explicit and typed. No string errors.
//!
//! Error classes follow the data-plane contract: I/O failures are fatal for
//! the affected reader or writer and are never retried internally; a
//! truncated read is a distinct corruption-class error, never conflated with
//! "not yet available"; operations racing a release fail with a
//! cancellation-class error. Precondition violations (writing after seal,
//! reading before seal) are programmer errors and panic via assertions
//! instead of appearing here.

use thiserror::Error;

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Errors that can occur in the exchange data-plane.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// I/O error from the underlying file.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// End of channel reached before the declared frame length was filled.
    #[error("truncated read at offset {offset}: expected {expected} bytes, found {found} bytes")]
    TruncatedRead {
        /// Byte offset where the read started.
        offset: u64,
        /// Bytes the frame declared.
        expected: u32,
        /// Bytes actually available.
        found: u32,
    },

    /// Frame header is invalid or corrupted.
    #[error("invalid frame header at offset {offset}: {reason}")]
    InvalidFrame {
        /// Byte offset of the header.
        offset: u64,
        /// Why the header is invalid.
        reason: &'static str,
    },

    /// Unit payload exceeds the maximum a read segment can stage.
    #[error("unit too large: {size} bytes exceeds max {max} bytes")]
    UnitTooLarge {
        /// Actual payload size in bytes.
        size: u32,
        /// Maximum allowed size.
        max: u32,
    },

    /// Pipelined queue reached its configured bound.
    #[error("subpartition queue full: {queued} units (max {max})")]
    QueueFull {
        /// Units currently queued.
        queued: u32,
        /// Maximum allowed.
        max: u32,
    },

    /// The operation raced a release; resources are gone.
    #[error("{operation} failed: resources already released")]
    Released {
        /// What operation was attempted.
        operation: &'static str,
    },
}

impl ExchangeError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }

    /// Returns true if this error indicates data corruption.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::TruncatedRead { .. } | Self::InvalidFrame { .. }
        )
    }

    /// Returns true if this error is the cancellation class (a release won
    /// the race).
    #[must_use]
    pub const fn is_released(&self) -> bool {
        matches!(self, Self::Released { .. })
    }
}

//! Availability notification.
//!
//! The exchange core never blocks: "not yet available" is returned
//! immediately and the consumer retries after a notification. The
//! [`AvailabilityListener`] is the seam those notifications cross - the
//! connection or scheduling component registers one, and the core pokes it
//! from whatever thread produced data or recycled a buffer.
//!
//! Notifications are level-ish signals, not messages: spurious wake-ups are
//! harmless because the poll re-checks real state, and there is no
//! at-most-once guarantee.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Callback invoked when a view or reader may have data again.
///
/// May be called from any thread, concurrently with polling. Implementations
/// must not block and must not call back into the notifying component.
pub trait AvailabilityListener: Send + Sync {
    /// Signals that a subsequent poll may succeed.
    fn notify_data_available(&self);
}

/// A latching flag listener.
///
/// The simplest listener: notification sets a flag, the consumer probes and
/// resets it. Used by synchronous poll loops and throughout the test suite.
#[derive(Debug, Default)]
pub struct AvailabilityFlag {
    available: AtomicBool,
}

impl AvailabilityFlag {
    /// Creates an unset flag.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            available: AtomicBool::new(false),
        }
    }

    /// Returns true if a notification arrived since the last reset.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Clears the flag.
    pub fn reset(&self) {
        self.available.store(false, Ordering::SeqCst);
    }

    /// Returns the flag state and clears it in one step.
    pub fn take(&self) -> bool {
        self.available.swap(false, Ordering::SeqCst)
    }
}

impl AvailabilityListener for AvailabilityFlag {
    fn notify_data_available(&self) {
        self.available.store(true, Ordering::SeqCst);
    }
}

/// A tokio-bridge listener.
///
/// Lets an async server task await wake-ups without the core itself ever
/// blocking: the core calls [`AvailabilityListener::notify_data_available`]
/// synchronously, the server task awaits [`NotifyListener::wait`]. A
/// notification that arrives while nobody is waiting is stored, so the next
/// wait returns immediately (no lost wake-ups).
#[derive(Debug, Default)]
pub struct NotifyListener {
    notify: Notify,
}

impl NotifyListener {
    /// Creates a listener with no pending notification.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            notify: Notify::const_new(),
        }
    }

    /// Waits until the next notification (or a stored one) arrives.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl AvailabilityListener for NotifyListener {
    fn notify_data_available(&self) {
        self.notify.notify_one();
    }
}

//! Pipelined (in-memory) subpartitions.
//!
//! A pipelined subpartition is a bounded in-memory queue of buffers: the
//! producer appends while the consumer drains, with no spill to disk. The
//! consumer side is a [`PipelinedSubpartitionView`] created once per consumer
//! connection.
//!
//! Availability is push-notified: every append, every finish, and every
//! buffer recycle pokes the registered listener unless the subpartition has
//! reached a terminal state (released, or finished and fully drained).
//!
//! Polling a control event pauses data consumption until
//! [`SubpartitionView::resume_consumption`] is called with fresh credits;
//! events themselves keep flowing while paused.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{debug, trace};

use flux_buffer::{
    AvailabilityListener, Buffer, BufferBacking, BufferRecycler, DataType,
};
use flux_core::{Limits, SubpartitionId};

use crate::error::{ExchangeError, ExchangeResult};
use crate::view::{Poll, RawMessage, SubpartitionView};

/// Shared state between the subpartition, its view, and the recycle hooks of
/// every buffer it has handed out.
struct PipelinedShared {
    id: SubpartitionId,
    max_queued: u32,
    queue: Mutex<VecDeque<Buffer>>,
    /// Producer called finish; the end-of-data event is in the queue.
    finished: AtomicBool,
    /// Resources released; terminal.
    released: AtomicBool,
    /// Finished and the consumer has observed the empty queue; terminal.
    drained: AtomicBool,
    /// Advisory unit count. Relaxed on purpose: monitoring only.
    queued: AtomicU32,
    /// Advisory data-unit count. Relaxed on purpose: credit sizing only.
    backlog: AtomicU32,
    listener: Mutex<Option<Arc<dyn AvailabilityListener>>>,
    view_active: AtomicBool,
}

impl PipelinedShared {
    fn is_terminal(&self) -> bool {
        self.released.load(Ordering::SeqCst) || self.drained.load(Ordering::SeqCst)
    }

    /// Pokes the registered listener, if any. Never called with the queue
    /// lock held.
    fn notify(&self) {
        let listener = self
            .listener
            .lock()
            .expect("listener lock poisoned")
            .clone();
        if let Some(listener) = listener {
            listener.notify_data_available();
        }
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        // Drain under the lock, drop outside it: the recycle hooks of the
        // dropped buffers observe the released flag and stay silent.
        let dropped: Vec<Buffer> = {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            queue.drain(..).collect()
        };
        self.queued.store(0, Ordering::Relaxed);
        self.backlog.store(0, Ordering::Relaxed);
        drop(dropped);

        debug!(id = %self.id, "released pipelined subpartition");
        self.notify();
    }
}

impl BufferRecycler for PipelinedShared {
    fn recycle(&self, _backing: BufferBacking) {
        if self.is_terminal() {
            trace!(id = %self.id, "suppressing recycle notification after terminal state");
            return;
        }
        self.notify();
    }
}

/// A bounded in-memory subpartition.
pub struct PipelinedSubpartition {
    shared: Arc<PipelinedShared>,
}

impl PipelinedSubpartition {
    /// Creates an empty subpartition with the default queue bound.
    #[must_use]
    pub fn new(id: SubpartitionId) -> Self {
        Self::with_max_queued(id, Limits::new().max_queued_units)
    }

    /// Creates an empty subpartition with an explicit queue bound.
    ///
    /// # Panics
    /// Panics if `max_queued` is zero.
    #[must_use]
    pub fn with_max_queued(id: SubpartitionId, max_queued: u32) -> Self {
        assert!(max_queued > 0, "queue bound must be positive");
        Self {
            shared: Arc::new(PipelinedShared {
                id,
                max_queued,
                queue: Mutex::new(VecDeque::new()),
                finished: AtomicBool::new(false),
                released: AtomicBool::new(false),
                drained: AtomicBool::new(false),
                queued: AtomicU32::new(0),
                backlog: AtomicU32::new(0),
                listener: Mutex::new(None),
                view_active: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the subpartition ID.
    #[must_use]
    pub fn id(&self) -> SubpartitionId {
        self.shared.id
    }

    /// Appends one unit.
    ///
    /// The buffer handed downstream carries a recycle hook that re-notifies
    /// the registered listener, unless the subpartition is already terminal.
    ///
    /// # Panics
    /// Panics if called after [`PipelinedSubpartition::finish`], or with the
    /// `None` data type.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Released`] after release and
    /// [`ExchangeError::QueueFull`] at the configured bound.
    pub fn add(
        &self,
        data_type: DataType,
        compressed: bool,
        payload: Bytes,
    ) -> ExchangeResult<()> {
        assert!(!data_type.is_none(), "a unit must carry data or an event");
        assert!(
            !self.shared.finished.load(Ordering::SeqCst),
            "cannot add to a finished subpartition"
        );

        if self.shared.released.load(Ordering::SeqCst) {
            return Err(ExchangeError::Released { operation: "add" });
        }

        self.push(data_type, compressed, payload)?;
        self.shared.notify();
        Ok(())
    }

    /// Marks the end of the stream.
    ///
    /// Appends the end-of-data control event; the consumer observes it as the
    /// final unit, after which the view reports finished.
    ///
    /// # Panics
    /// Panics if called twice.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Released`] after release.
    pub fn finish(&self) -> ExchangeResult<()> {
        assert!(
            !self.shared.finished.load(Ordering::SeqCst),
            "subpartition already finished"
        );

        if self.shared.released.load(Ordering::SeqCst) {
            return Err(ExchangeError::Released { operation: "finish" });
        }

        self.push(DataType::EventBuffer, false, Bytes::new())?;
        self.shared.finished.store(true, Ordering::SeqCst);
        debug!(id = %self.shared.id, "finished pipelined subpartition");
        self.shared.notify();
        Ok(())
    }

    fn push(&self, data_type: DataType, compressed: bool, payload: Bytes) -> ExchangeResult<()> {
        let hook = Arc::clone(&self.shared) as Arc<dyn BufferRecycler>;
        let buffer = Buffer::with_recycler(payload, data_type, compressed, hook);

        let mut queue = self.shared.queue.lock().expect("queue lock poisoned");
        #[allow(clippy::cast_possible_truncation)] // Queue length is bounded by max_queued.
        let queued = queue.len() as u32;
        if queued >= self.shared.max_queued {
            return Err(ExchangeError::QueueFull {
                queued,
                max: self.shared.max_queued,
            });
        }

        queue.push_back(buffer);
        self.shared.queued.fetch_add(1, Ordering::Relaxed);
        if data_type.is_buffer() {
            self.shared.backlog.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Returns true once the producer has finished the stream.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    /// Releases the subpartition and everything queued in it.
    ///
    /// Idempotent. Buffers dropped here do not fire availability
    /// notifications.
    pub fn release(&self) {
        self.shared.release();
    }

    /// Returns true once released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Creates the consumer-side view.
    ///
    /// Notifies the listener immediately when units are already queued, so a
    /// consumer attaching late does not wait for the next append.
    ///
    /// # Panics
    /// Panics if a view already exists for this subpartition.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Released`] after release.
    pub fn create_view(
        &self,
        listener: Arc<dyn AvailabilityListener>,
    ) -> ExchangeResult<PipelinedSubpartitionView> {
        if self.shared.released.load(Ordering::SeqCst) {
            return Err(ExchangeError::Released {
                operation: "create_view",
            });
        }
        assert!(
            !self.shared.view_active.swap(true, Ordering::SeqCst),
            "subpartition already has an active view"
        );

        *self.shared.listener.lock().expect("listener lock poisoned") = Some(listener);

        if self.shared.queued.load(Ordering::Relaxed) > 0 || self.is_finished() {
            self.shared.notify();
        }

        Ok(PipelinedSubpartitionView {
            shared: Arc::clone(&self.shared),
            paused: AtomicBool::new(false),
        })
    }
}

impl std::fmt::Debug for PipelinedSubpartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelinedSubpartition")
            .field("id", &self.shared.id)
            .field("queued", &self.shared.queued.load(Ordering::Relaxed))
            .field("finished", &self.shared.finished.load(Ordering::SeqCst))
            .field("released", &self.shared.released.load(Ordering::SeqCst))
            .finish()
    }
}

/// Consumer-side cursor over a [`PipelinedSubpartition`].
pub struct PipelinedSubpartitionView {
    shared: Arc<PipelinedShared>,
    paused: AtomicBool,
}

impl SubpartitionView for PipelinedSubpartitionView {
    fn poll_next(&self) -> ExchangeResult<Poll> {
        if self.shared.released.load(Ordering::SeqCst) {
            return Err(ExchangeError::Released {
                operation: "poll_next",
            });
        }

        let mut queue = self.shared.queue.lock().expect("queue lock poisoned");

        let Some(head) = queue.front() else {
            if self.shared.finished.load(Ordering::SeqCst) {
                self.shared.drained.store(true, Ordering::SeqCst);
                return Ok(Poll::Finished);
            }
            return Ok(Poll::NotYet);
        };

        if head.is_buffer() && self.paused.load(Ordering::SeqCst) {
            return Ok(Poll::NotYet);
        }

        let buffer = queue.pop_front().expect("head observed above");
        self.shared.queued.fetch_sub(1, Ordering::Relaxed);
        if buffer.is_buffer() {
            self.shared.backlog.fetch_sub(1, Ordering::Relaxed);
        } else {
            // Control events are alignment points: data consumption pauses
            // until new credits arrive via resume_consumption.
            self.paused.store(true, Ordering::SeqCst);
        }

        let paused = self.paused.load(Ordering::SeqCst);
        let data_available = queue
            .front()
            .is_some_and(|next| next.is_event() || !paused);
        let event_available = queue.front().is_some_and(Buffer::is_event);
        let backlog = self.shared.backlog.load(Ordering::Relaxed);

        Ok(Poll::Ready(RawMessage::buffer(
            buffer,
            data_available,
            event_available,
            backlog,
        )))
    }

    fn notify_data_available(&self) {
        self.shared.notify();
    }

    fn is_available(&self, credits: u32) -> bool {
        if self.shared.released.load(Ordering::SeqCst) {
            return false;
        }

        let queue = self.shared.queue.lock().expect("queue lock poisoned");
        let Some(head) = queue.front() else {
            return false;
        };

        if credits == 0 {
            return head.is_event();
        }
        head.is_event() || !self.paused.load(Ordering::SeqCst)
    }

    fn resume_consumption(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn release_all_resources(&self) -> ExchangeResult<()> {
        self.shared.release();
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    fn failure_cause(&self) -> Option<ExchangeError> {
        // The in-memory path performs no I/O; nothing can fail fatally.
        None
    }

    fn queued_unit_count(&self) -> u32 {
        self.shared.queued.load(Ordering::Relaxed)
    }

    fn data_backlog(&self) -> u32 {
        self.shared.backlog.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for PipelinedSubpartitionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelinedSubpartitionView")
            .field("id", &self.shared.id)
            .field("paused", &self.paused.load(Ordering::SeqCst))
            .field("released", &self.shared.released.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_buffer::AvailabilityFlag;

    fn subpartition() -> PipelinedSubpartition {
        PipelinedSubpartition::new(SubpartitionId::new(1))
    }

    fn view_with_flag(
        subpartition: &PipelinedSubpartition,
    ) -> (PipelinedSubpartitionView, Arc<AvailabilityFlag>) {
        let flag = Arc::new(AvailabilityFlag::new());
        let view = subpartition
            .create_view(Arc::clone(&flag) as Arc<dyn AvailabilityListener>)
            .unwrap();
        (view, flag)
    }

    #[test]
    fn test_poll_empty_is_not_yet() {
        let subpartition = subpartition();
        let (view, _flag) = view_with_flag(&subpartition);

        assert!(matches!(view.poll_next().unwrap(), Poll::NotYet));
    }

    #[test]
    fn test_add_then_poll() {
        let subpartition = subpartition();
        let (view, flag) = view_with_flag(&subpartition);

        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"one"))
            .unwrap();
        assert!(flag.take());

        let Poll::Ready(message) = view.poll_next().unwrap() else {
            panic!("expected a ready unit");
        };
        assert!(message.is_buffer());
        assert!(matches!(view.poll_next().unwrap(), Poll::NotYet));
    }

    #[test]
    fn test_finish_appends_event_then_finished() {
        let subpartition = subpartition();
        let (view, _flag) = view_with_flag(&subpartition);

        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"one"))
            .unwrap();
        subpartition.finish().unwrap();

        let Poll::Ready(data) = view.poll_next().unwrap() else {
            panic!("expected the data unit");
        };
        assert!(data.is_buffer());
        // The end-of-data event is still queued behind the data unit.
        assert!(data.is_more_available(0));

        let Poll::Ready(event) = view.poll_next().unwrap() else {
            panic!("expected the end-of-data event");
        };
        assert!(!event.is_buffer());

        assert!(matches!(view.poll_next().unwrap(), Poll::Finished));
        // Terminal state is stable.
        assert!(matches!(view.poll_next().unwrap(), Poll::Finished));
    }

    #[test]
    fn test_event_pauses_data_until_resume() {
        let subpartition = subpartition();
        let (view, _flag) = view_with_flag(&subpartition);

        subpartition
            .add(DataType::EventBuffer, false, Bytes::new())
            .unwrap();
        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"d"))
            .unwrap();

        let Poll::Ready(event) = view.poll_next().unwrap() else {
            panic!("expected the event");
        };
        assert!(!event.is_buffer());

        // Data is withheld while paused.
        assert!(matches!(view.poll_next().unwrap(), Poll::NotYet));
        assert!(!view.is_available(1));

        view.resume_consumption();
        assert!(view.is_available(1));
        assert!(matches!(view.poll_next().unwrap(), Poll::Ready(_)));
    }

    #[test]
    fn test_credit_gating() {
        let subpartition = subpartition();
        let (view, _flag) = view_with_flag(&subpartition);

        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"d"))
            .unwrap();

        // Data at the head: zero credits sees nothing.
        assert!(view.is_available(1));
        assert!(!view.is_available(0));

        let Poll::Ready(_) = view.poll_next().unwrap() else {
            panic!("expected the data unit");
        };

        subpartition
            .add(DataType::EventBuffer, false, Bytes::new())
            .unwrap();

        // Event at the head: available regardless of credits.
        assert!(view.is_available(0));
        assert!(view.is_available(1));
    }

    #[test]
    fn test_recycle_notifies_until_terminal() {
        let subpartition = subpartition();
        let (view, flag) = view_with_flag(&subpartition);

        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"d"))
            .unwrap();
        subpartition.finish().unwrap();

        let Poll::Ready(data) = view.poll_next().unwrap() else {
            panic!("expected the data unit");
        };
        let wire = data
            .build_message(flux_core::ReceiverId::new(0), 0)
            .unwrap();

        flag.reset();
        // Recycling before the stream is drained re-notifies.
        drop(wire);
        assert!(flag.take());

        // Drain to terminal.
        let Poll::Ready(event) = view.poll_next().unwrap() else {
            panic!("expected the end-of-data event");
        };
        assert!(matches!(view.poll_next().unwrap(), Poll::Finished));

        flag.reset();
        // Recycling after the terminal state stays silent.
        event.build_message(flux_core::ReceiverId::new(0), 1).unwrap();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_release_is_idempotent_and_fails_later_polls() {
        let subpartition = subpartition();
        let (view, _flag) = view_with_flag(&subpartition);

        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"d"))
            .unwrap();

        view.release_all_resources().unwrap();
        assert!(view.is_released());
        view.release_all_resources().unwrap();
        assert!(view.is_released());

        let err = view.poll_next().unwrap_err();
        assert!(err.is_released());
        assert!(subpartition
            .add(DataType::DataBuffer, false, Bytes::new())
            .unwrap_err()
            .is_released());
    }

    #[test]
    fn test_queue_bound() {
        let subpartition =
            PipelinedSubpartition::with_max_queued(SubpartitionId::new(1), 2);

        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"a"))
            .unwrap();
        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"b"))
            .unwrap();

        let err = subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"c"))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::QueueFull { queued: 2, max: 2 }));
    }

    #[test]
    fn test_counters_are_advisory_but_track() {
        let subpartition = subpartition();
        let (view, _flag) = view_with_flag(&subpartition);

        subpartition
            .add(DataType::DataBuffer, false, Bytes::from_static(b"a"))
            .unwrap();
        subpartition
            .add(DataType::EventBuffer, false, Bytes::new())
            .unwrap();

        assert_eq!(view.queued_unit_count(), 2);
        assert_eq!(view.data_backlog(), 1);

        let _ = view.poll_next().unwrap();
        assert_eq!(view.queued_unit_count(), 1);
        assert_eq!(view.data_backlog(), 0);
    }

    #[test]
    #[should_panic(expected = "already has an active view")]
    fn test_second_view_panics() {
        let subpartition = subpartition();
        let (_view, _flag) = view_with_flag(&subpartition);
        let _ = view_with_flag(&subpartition);
    }
}

//! Live-query types shared between the manager and data-layer adapters.

use crate::types::{DomainEvent, Stream};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Sort direction for a live query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter on a single document field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub equals: String,
}

/// Ordering clause for a live query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A live query against one collection: equality filter, ordering, and
/// a cap on the delivered window.
#[derive(Clone, Debug)]
pub struct QuerySpec {
    pub collection: Stream,
    pub filter: FieldFilter,
    pub order_by: OrderBy,
    pub limit: usize,
}

/// Events delivered to a feed handle.
#[derive(Clone, Debug)]
pub enum FeedEvent {
    /// The full current window after a change in the backing store.
    /// Replaces all previously delivered state, never a delta.
    Snapshot(Vec<DomainEvent>),

    /// The query failed. Reported once per failure; the manager never
    /// retries on its own.
    Failed { message: String },

    /// The subscription was cancelled.
    Cancelled,
}

/// Delivery side of a subscription, handed to the data layer.
///
/// Deliveries are rejected once the owning subscription is cancelled,
/// so a slow backend cannot push events past teardown.
pub struct SnapshotSink {
    sender: Sender<FeedEvent>,
    live: Arc<AtomicBool>,
}

impl SnapshotSink {
    pub(crate) fn new(sender: Sender<FeedEvent>, live: Arc<AtomicBool>) -> Self {
        Self { sender, live }
    }

    /// Deliver the full current window. Returns false if the
    /// subscription is no longer accepting events.
    pub fn deliver(&self, batch: Vec<DomainEvent>) -> bool {
        self.send(FeedEvent::Snapshot(batch))
    }

    /// Report a query failure. Returns false if the subscription is no
    /// longer accepting events.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.send(FeedEvent::Failed {
            message: message.into(),
        })
    }

    fn send(&self, event: FeedEvent) -> bool {
        if !self.live.load(Ordering::Acquire) {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // The next store change redelivers the full window, so a
                // dropped snapshot only delays convergence.
                warn!("feed buffer full, dropping delivery");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for receiving feed events.
pub struct FeedHandle {
    receiver: Receiver<FeedEvent>,
}

impl FeedHandle {
    pub(crate) fn new(receiver: Receiver<FeedEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<FeedEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<FeedEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<FeedEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Live-query capability provided by the external data layer.
///
/// Implementations deliver the initial window promptly after `open` and
/// the full current window again on every subsequent change.
pub trait LiveQuerySource: Send + Sync {
    /// Open a live query, delivering snapshots through `sink` until the
    /// returned guard is cancelled.
    fn open(&self, spec: QuerySpec, sink: SnapshotSink) -> crate::error::Result<Box<dyn QueryGuard>>;
}

/// Backend-owned handle that stops delivery for one open query.
pub trait QueryGuard: Send {
    /// Stop the underlying query. Called at most once by the manager.
    fn cancel(&mut self);
}

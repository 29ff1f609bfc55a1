//! Subscription manager enforcing the one-live-query invariant.

use crate::error::Result;
use crate::types::Role;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::types::{
    Direction, FeedEvent, FeedHandle, FieldFilter, LiveQuerySource, OrderBy, QueryGuard,
    QuerySpec, SnapshotSink,
};

/// Number of most-recent records a live window contains.
pub const RECENT_WINDOW: usize = 10;

/// Max buffered events per subscription before deliveries are dropped.
const DEFAULT_BUFFER: usize = 1024;

/// State of the currently open query.
struct ActiveQuery {
    subject_id: String,
    role: Role,
    live: Arc<AtomicBool>,
    guard: Box<dyn QueryGuard>,
    sender: Sender<FeedEvent>,
}

/// Opens and tears down live queries against the external store.
///
/// At most one query is open at a time: subscribing again cancels the
/// previous query as part of establishing the new one, and the backend
/// handle is always released on teardown.
pub struct SubscriptionManager {
    source: Arc<dyn LiveQuerySource>,
    active: Mutex<Option<ActiveQuery>>,
}

impl SubscriptionManager {
    /// Create a manager over the given data layer.
    pub fn new(source: Arc<dyn LiveQuerySource>) -> Self {
        Self {
            source,
            active: Mutex::new(None),
        }
    }

    /// Window query for one subject and role.
    fn spec_for(subject_id: &str, role: Role) -> QuerySpec {
        QuerySpec {
            collection: role.stream(),
            filter: FieldFilter {
                field: "ownerId".to_string(),
                equals: subject_id.to_string(),
            },
            order_by: OrderBy {
                field: "createdAt".to_string(),
                direction: Direction::Descending,
            },
            limit: RECENT_WINDOW,
        }
    }

    /// Open a live query for `(subject_id, role)`, cancelling any
    /// previous query first.
    ///
    /// Every delivery on the returned handle carries the full current
    /// window. Establishment failure leaves no query open.
    pub fn subscribe(&self, subject_id: &str, role: Role) -> Result<FeedHandle> {
        let mut active = self.active.lock();
        Self::teardown(&mut active);

        let (sender, receiver) = bounded(DEFAULT_BUFFER);
        let live = Arc::new(AtomicBool::new(true));
        let sink = SnapshotSink::new(sender.clone(), live.clone());

        let spec = Self::spec_for(subject_id, role);
        debug!(subject_id, ?role, "opening live query");
        let guard = self.source.open(spec, sink)?;

        *active = Some(ActiveQuery {
            subject_id: subject_id.to_string(),
            role,
            live,
            guard,
            sender,
        });

        Ok(FeedHandle::new(receiver))
    }

    /// Cancel the open query, if any. Idempotent and synchronous: no
    /// delivery is accepted after this returns.
    pub fn cancel(&self) {
        let mut active = self.active.lock();
        Self::teardown(&mut active);
    }

    /// The `(subject, role)` of the open query, if any.
    pub fn active(&self) -> Option<(String, Role)> {
        self.active
            .lock()
            .as_ref()
            .map(|query| (query.subject_id.clone(), query.role))
    }

    fn teardown(active: &mut Option<ActiveQuery>) {
        if let Some(mut query) = active.take() {
            // Gate the sink before the backend sees the cancellation so
            // nothing slips through mid-teardown.
            query.live.store(false, Ordering::Release);
            query.guard.cancel();
            let _ = query.sender.try_send(FeedEvent::Cancelled);
            debug!(subject_id = %query.subject_id, "live query cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::types::{AuctionStatus, DomainEvent, Stream};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSource {
        opened: Mutex<Vec<QuerySpec>>,
        sinks: Mutex<Vec<SnapshotSink>>,
        cancellations: Arc<AtomicUsize>,
    }

    struct FakeGuard {
        cancellations: Arc<AtomicUsize>,
    }

    impl QueryGuard for FakeGuard {
        fn cancel(&mut self) {
            self.cancellations.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl LiveQuerySource for FakeSource {
        fn open(&self, spec: QuerySpec, sink: SnapshotSink) -> Result<Box<dyn QueryGuard>> {
            self.opened.lock().push(spec);
            self.sinks.lock().push(sink);
            Ok(Box::new(FakeGuard {
                cancellations: self.cancellations.clone(),
            }))
        }
    }

    struct RejectingSource;

    impl LiveQuerySource for RejectingSource {
        fn open(&self, _spec: QuerySpec, _sink: SnapshotSink) -> Result<Box<dyn QueryGuard>> {
            Err(FeedError::QueryRejected("permission denied".to_string()))
        }
    }

    #[test]
    fn test_subscribe_builds_window_query() {
        let source = Arc::new(FakeSource::default());
        let manager = SubscriptionManager::new(source.clone());

        manager.subscribe("agent-1", Role::Agent).unwrap();

        let opened = source.opened.lock();
        assert_eq!(opened.len(), 1);
        let spec = &opened[0];
        assert_eq!(spec.collection, Stream::Auctions);
        assert_eq!(spec.filter.field, "ownerId");
        assert_eq!(spec.filter.equals, "agent-1");
        assert_eq!(spec.order_by.field, "createdAt");
        assert_eq!(spec.order_by.direction, Direction::Descending);
        assert_eq!(spec.limit, RECENT_WINDOW);
    }

    #[test]
    fn test_second_subscribe_cancels_first() {
        let source = Arc::new(FakeSource::default());
        let manager = SubscriptionManager::new(source.clone());

        manager.subscribe("agent-1", Role::Agent).unwrap();
        let handle = manager.subscribe("contractor-2", Role::Contractor).unwrap();

        assert_eq!(source.cancellations.load(Ordering::SeqCst), 1);
        assert_eq!(
            manager.active(),
            Some(("contractor-2".to_string(), Role::Contractor))
        );

        // The first sink is gated; only the second still delivers.
        let sinks = source.sinks.lock();
        assert!(!sinks[0].deliver(Vec::new()));
        assert!(sinks[1].deliver(Vec::new()));

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(event, FeedEvent::Snapshot(batch) if batch.is_empty()));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let source = Arc::new(FakeSource::default());
        let manager = SubscriptionManager::new(source.clone());

        let handle = manager.subscribe("agent-1", Role::Agent).unwrap();
        manager.cancel();
        manager.cancel();

        assert_eq!(source.cancellations.load(Ordering::SeqCst), 1);
        assert!(manager.active().is_none());

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(event, FeedEvent::Cancelled));
    }

    #[test]
    fn test_delivery_after_cancel_is_rejected() {
        let source = Arc::new(FakeSource::default());
        let manager = SubscriptionManager::new(source.clone());

        let handle = manager.subscribe("agent-1", Role::Agent).unwrap();
        manager.cancel();

        let sinks = source.sinks.lock();
        let event = DomainEvent::auction("a1", "agent-1", AuctionStatus::Active);
        assert!(!sinks[0].deliver(vec![event]));
        assert!(!sinks[0].fail("late failure"));

        // Only the teardown marker reaches the handle.
        let first = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(first, FeedEvent::Cancelled));
        assert!(handle.try_recv().is_err());
    }

    #[test]
    fn test_rejected_query_leaves_no_active_subscription() {
        let manager = SubscriptionManager::new(Arc::new(RejectingSource));

        let result = manager.subscribe("agent-1", Role::Agent);
        assert!(matches!(result, Err(FeedError::QueryRejected(_))));
        assert!(manager.active().is_none());
    }
}

//! Live notification feed: subscription, recompute, read-state.

use super::{derive_all, Notification, NotificationId};
use crate::error::Result;
use crate::subscriptions::{FeedEvent, FeedHandle, LiveQuerySource, SubscriptionManager};
use crate::types::{Role, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Presentation snapshot of the feed.
#[derive(Clone, Debug)]
pub struct FeedView {
    pub items: Vec<Notification>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Mutable feed state, replaced wholesale on every delivery.
struct FeedState {
    items: Vec<Notification>,
    is_loading: bool,
    error: Option<String>,
    role: Option<Role>,
    handle: Option<FeedHandle>,
}

/// Live notification feed for one subject at a time.
///
/// The derived item set is a pure function of the latest delivered
/// window; what the user has seen is a separate keyed store merged in
/// at view time, so recomputation never forgets a dismissal.
pub struct NotificationFeed {
    manager: SubscriptionManager,
    state: Mutex<FeedState>,
    read: Mutex<HashMap<NotificationId, bool>>,
}

impl NotificationFeed {
    /// Create a feed over the given data layer.
    pub fn new(source: Arc<dyn LiveQuerySource>) -> Self {
        Self {
            manager: SubscriptionManager::new(source),
            state: Mutex::new(FeedState {
                items: Vec::new(),
                is_loading: false,
                error: None,
                role: None,
                handle: None,
            }),
            read: Mutex::new(HashMap::new()),
        }
    }

    /// Follow `(subject_id, role)`, replacing any previous
    /// subscription. The feed reports loading until the first delivery
    /// arrives.
    pub fn follow(&self, subject_id: &str, role: Role) -> Result<()> {
        let handle = self.manager.subscribe(subject_id, role)?;

        let mut state = self.state.lock();
        state.handle = Some(handle);
        state.role = Some(role);
        state.is_loading = true;
        state.error = None;
        Ok(())
    }

    /// Drain pending deliveries in order, recomputing the notification
    /// set once per snapshot. Returns the number of events processed.
    ///
    /// Each snapshot replaces the item set atomically. A failed
    /// delivery keeps the last-good items and records the error; a
    /// half-derived list is never observable.
    pub fn pump(&self) -> usize {
        let mut state = self.state.lock();
        let role = match state.role {
            Some(role) => role,
            None => return 0,
        };

        let mut processed = 0;
        loop {
            let event = match state.handle.as_ref().map(|handle| handle.try_recv()) {
                Some(Ok(event)) => event,
                _ => break,
            };
            processed += 1;

            match event {
                FeedEvent::Snapshot(batch) => {
                    state.items = derive_all(&batch, role, Timestamp::now());
                    state.is_loading = false;
                    state.error = None;
                }
                FeedEvent::Failed { message } => {
                    warn!(%message, "live query failed");
                    state.is_loading = false;
                    state.error = Some(message);
                }
                FeedEvent::Cancelled => {
                    state.handle = None;
                    break;
                }
            }
        }
        processed
    }

    /// Presentation view with read-state merged in.
    pub fn view(&self) -> FeedView {
        let state = self.state.lock();
        let read = self.read.lock();

        let items = state
            .items
            .iter()
            .cloned()
            .map(|mut item| {
                if read.get(&item.id).copied().unwrap_or(false) {
                    item.read = true;
                }
                item
            })
            .collect();

        FeedView {
            items,
            is_loading: state.is_loading,
            error: state.error.clone(),
        }
    }

    /// Record that the user has seen one notification.
    pub fn mark_read(&self, id: &NotificationId) {
        self.read.lock().insert(id.clone(), true);
    }

    /// Record that the user has seen everything currently derived.
    pub fn mark_all_read(&self) {
        let state = self.state.lock();
        let mut read = self.read.lock();
        for item in &state.items {
            read.insert(item.id.clone(), true);
        }
    }

    /// Number of currently derived items the user has not seen.
    pub fn unread_count(&self) -> usize {
        let state = self.state.lock();
        let read = self.read.lock();
        state
            .items
            .iter()
            .filter(|item| !read.get(&item.id).copied().unwrap_or(false))
            .count()
    }

    /// Stop following. Idempotent; the last derived items remain
    /// viewable.
    pub fn stop(&self) {
        self.manager.cancel();
        let mut state = self.state.lock();
        state.handle = None;
        state.is_loading = false;
    }
}

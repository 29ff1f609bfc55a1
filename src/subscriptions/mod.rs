//! Live subscription layer over the external document store.
//!
//! One manager owns at most one live query at a time. Each query is a
//! filtered, ordered, capped window over a single collection; the store
//! redelivers the full window on every change, never a delta.
//!
//! The data layer plugs in through [`LiveQuerySource`]; the consumer
//! side receives [`FeedEvent`]s through a [`FeedHandle`].
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(source);
//! let handle = manager.subscribe("agent-1", Role::Agent)?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(FeedEvent::Snapshot(batch)) => println!("window: {} records", batch.len()),
//!         Ok(FeedEvent::Failed { message }) => break,
//!         Ok(FeedEvent::Cancelled) | Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::{SubscriptionManager, RECENT_WINDOW};
pub use types::{
    Direction, FeedEvent, FeedHandle, FieldFilter, LiveQuerySource, OrderBy, QueryGuard,
    QuerySpec, SnapshotSink,
};

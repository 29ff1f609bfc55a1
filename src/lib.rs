//! # Marketpulse
//!
//! Real-time core for a role-gated marketplace client: agents post work
//! and run auctions, contractors bid and invoice. This crate derives
//! the transient, time-sensitive state those pages show.
//!
//! ## Core Pieces
//!
//! - **Subscriptions**: at most one live query per manager, delivering
//!   the full current window of a filtered collection on every change
//! - **Notifications**: pure recompute of the user-facing notification
//!   set from each delivered window, with read-state tracked separately
//! - **Rate limiting**: per-key full-reset token buckets guarding write
//!   actions, bounded by LRU eviction
//! - **Countdowns**: pure deadline evaluation driven by an owned
//!   once-per-second ticker
//!
//! ## Example
//!
//! ```ignore
//! use marketpulse::{NotificationFeed, RateLimiter, Role};
//!
//! let feed = NotificationFeed::new(source);
//! feed.follow("agent-1", Role::Agent)?;
//!
//! feed.pump();
//! let view = feed.view();
//! println!("{} unread", feed.unread_count());
//!
//! let limiter = RateLimiter::new();
//! let decision = limiter.try_consume("place-bid", 3, Duration::from_secs(1));
//! if !decision.allowed {
//!     println!("retry in {:?}", decision.retry_after);
//! }
//! ```

pub mod countdown;
pub mod error;
pub mod limiter;
pub mod notifications;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use countdown::{CountdownState, CountdownTicker, TICK_PERIOD};
pub use error::{FeedError, Result};
pub use limiter::{RateDecision, RateLimiter};
pub use notifications::{
    derive_all, FeedView, Notification, NotificationFeed, NotificationId, NotificationKind,
    NotificationSource,
};
pub use subscriptions::{
    Direction, FeedEvent, FeedHandle, FieldFilter, LiveQuerySource, OrderBy, QueryGuard,
    QuerySpec, SnapshotSink, SubscriptionManager, RECENT_WINDOW,
};
pub use types::*;

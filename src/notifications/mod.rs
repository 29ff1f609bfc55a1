//! Notification derivation and the live feed built on top of it.
//!
//! Notifications are a pure function of the most recently delivered
//! window: every snapshot replaces the whole set, nothing accumulates
//! across recomputations. What the user has already seen is tracked
//! separately (see [`NotificationFeed`]), so recomputing never forgets
//! a dismissal.

mod derive;
mod feed;

pub use derive::derive_all;
pub use feed::{FeedView, NotificationFeed};

use crate::types::{EventId, InvoiceStatus, Stream, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of user-facing notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BiddingStarted,
    BiddingEnded,
    InvoicePending,
    AuctionEnded,
}

impl NotificationKind {
    /// Stable wire name, also used in notification identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::BiddingStarted => "bidding_started",
            NotificationKind::BiddingEnded => "bidding_ended",
            NotificationKind::InvoicePending => "invoice_pending",
            NotificationKind::AuctionEnded => "auction_ended",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic notification identity.
///
/// Derived from `(stream, event id, kind)`, so the same source event
/// always yields the same identifier across recomputations. This is
/// what makes dedup and read-state reconciliation possible.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(String);

impl NotificationId {
    pub(crate) fn derive(stream: Stream, event: &EventId, kind: NotificationKind) -> Self {
        NotificationId(format!("{}:{}:{}", stream, event, kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotificationId({})", self.0)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Diagnostic back-reference to the originating event, keyed by kind.
/// Each variant carries only the fields its kind actually uses; none of
/// this participates in notification identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationSource {
    BiddingStarted {
        auction: EventId,
    },
    BiddingEnded {
        auction: EventId,
        bid_count: u32,
    },
    InvoicePending {
        invoice: EventId,
        invoice_number: Option<String>,
        status: InvoiceStatus,
    },
    AuctionEnded {
        auction: EventId,
    },
}

/// A derived, user-facing notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: Timestamp,
    /// Always false on derivation; presentation merges the read-state
    /// store on top (see [`NotificationFeed::view`]).
    pub read: bool,
    /// Back-reference to the originating event.
    pub source: NotificationSource,
}

//! Domain types shared across the real-time core.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_millis() as i64)
    }

    /// This timestamp shifted by `millis` (negative shifts backward).
    pub fn offset(self, millis: i64) -> Self {
        Timestamp(self.0 + millis)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Marketplace role a live feed is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Posts work and runs auctions.
    Agent,
    /// Bids on work and submits invoices.
    Contractor,
}

impl Role {
    /// The stream this role's notifications are derived from.
    pub fn stream(self) -> Stream {
        match self {
            Role::Agent => Stream::Auctions,
            Role::Contractor => Stream::Invoices,
        }
    }
}

/// A named external collection of domain records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Auctions,
    Invoices,
}

impl Stream {
    /// Collection name in the backing store.
    pub fn collection(self) -> &'static str {
        match self {
            Stream::Auctions => "auctions",
            Stream::Invoices => "invoices",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Opaque record identifier, unique within its stream.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// Truncated form, used as a display fallback when a friendlier
    /// field is missing.
    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Auction lifecycle status as reported by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Active,
    Closed,
    /// Any status this core does not recognize.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuctionStatus::Active => "active",
            AuctionStatus::Closed => "closed",
            AuctionStatus::Unknown => "unknown",
        })
    }
}

/// Invoice lifecycle status as reported by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Submitted,
    Approved,
    Paid,
    /// Any status this core does not recognize.
    #[serde(other)]
    Unknown,
}

impl InvoiceStatus {
    /// Whether the invoice still needs attention from the contractor's
    /// counterparty.
    pub fn is_pending(self) -> bool {
        matches!(self, InvoiceStatus::Submitted | InvoiceStatus::Approved)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Unknown => "unknown",
        })
    }
}

/// Snapshot of one record from a live stream.
///
/// Display fields are optional: partially written documents are
/// tolerated and fall back to defaults at derivation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Identifier, unique within the stream.
    pub id: EventId,

    /// Subject the stream is filtered by.
    pub owner_id: String,

    /// Creation time; source of recency ordering. Absent on documents
    /// whose server timestamp has not materialized yet.
    pub created_at: Option<Timestamp>,

    /// Stream-specific fields.
    #[serde(flatten)]
    pub body: EventBody,
}

/// Stream-specific portion of a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventBody {
    Auction {
        title: Option<String>,
        status: AuctionStatus,
        bid_count: u32,
    },
    Invoice {
        invoice_number: Option<String>,
        amount: Option<f64>,
        status: InvoiceStatus,
    },
}

impl DomainEvent {
    /// Create an auction snapshot.
    pub fn auction(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        status: AuctionStatus,
    ) -> Self {
        Self {
            id: EventId(id.into()),
            owner_id: owner_id.into(),
            created_at: None,
            body: EventBody::Auction {
                title: None,
                status,
                bid_count: 0,
            },
        }
    }

    /// Create an invoice snapshot.
    pub fn invoice(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        status: InvoiceStatus,
    ) -> Self {
        Self {
            id: EventId(id.into()),
            owner_id: owner_id.into(),
            created_at: None,
            body: EventBody::Invoice {
                invoice_number: None,
                amount: None,
                status,
            },
        }
    }

    /// Decode a raw store document. Backend adapters use this to turn
    /// JSON snapshots into typed events.
    pub fn from_document(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Which stream this snapshot belongs to.
    pub fn stream(&self) -> Stream {
        match self.body {
            EventBody::Auction { .. } => Stream::Auctions,
            EventBody::Invoice { .. } => Stream::Invoices,
        }
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, at: Timestamp) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Set the auction title. No effect on invoice snapshots.
    pub fn with_title(mut self, value: impl Into<String>) -> Self {
        if let EventBody::Auction { title, .. } = &mut self.body {
            *title = Some(value.into());
        }
        self
    }

    /// Set the auction bid count. No effect on invoice snapshots.
    pub fn with_bid_count(mut self, count: u32) -> Self {
        if let EventBody::Auction { bid_count, .. } = &mut self.body {
            *bid_count = count;
        }
        self
    }

    /// Set the invoice number. No effect on auction snapshots.
    pub fn with_invoice_number(mut self, value: impl Into<String>) -> Self {
        if let EventBody::Invoice { invoice_number, .. } = &mut self.body {
            *invoice_number = Some(value.into());
        }
        self
    }

    /// Set the invoice amount. No effect on auction snapshots.
    pub fn with_amount(mut self, value: f64) -> Self {
        if let EventBody::Invoice { amount, .. } = &mut self.body {
            *amount = Some(value);
        }
        self
    }
}

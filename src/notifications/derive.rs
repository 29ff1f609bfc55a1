//! Pure derivation of notifications from a delivered window.

use super::{Notification, NotificationId, NotificationKind, NotificationSource};
use crate::types::{AuctionStatus, DomainEvent, EventBody, InvoiceStatus, Role, Timestamp};

/// Derive the full notification set for one delivered window.
///
/// Total recompute: the result replaces any previously derived set.
/// Output order follows batch order (stream recency); records from the
/// other role's stream contribute nothing. `now` stands in for missing
/// record timestamps.
///
/// Auctions emit on window membership, not on status transition: every
/// auction in the window yields a `BiddingStarted` item on every
/// recompute, plus a `BiddingEnded` item once closed.
pub fn derive_all(batch: &[DomainEvent], role: Role, now: Timestamp) -> Vec<Notification> {
    let mut items = Vec::new();

    for event in batch {
        match (role, &event.body) {
            (
                Role::Agent,
                EventBody::Auction {
                    title,
                    status,
                    bid_count,
                },
            ) => {
                let name = display_name(title.as_deref(), event);
                items.push(bidding_started(event, &name, now));
                if *status == AuctionStatus::Closed {
                    items.push(bidding_ended(event, &name, *bid_count, now));
                }
            }
            (
                Role::Contractor,
                EventBody::Invoice {
                    invoice_number,
                    status,
                    ..
                },
            ) => {
                if status.is_pending() {
                    items.push(invoice_pending(event, invoice_number.as_deref(), *status, now));
                }
            }
            _ => {}
        }
    }

    items
}

fn display_name(title: Option<&str>, event: &DomainEvent) -> String {
    match title {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => event.id.short(),
    }
}

fn stamp(event: &DomainEvent, now: Timestamp) -> Timestamp {
    event.created_at.unwrap_or(now)
}

fn bidding_started(event: &DomainEvent, name: &str, now: Timestamp) -> Notification {
    let kind = NotificationKind::BiddingStarted;
    Notification {
        id: NotificationId::derive(event.stream(), &event.id, kind),
        kind,
        title: "Bidding Started".to_string(),
        message: format!("Bidding is open on \"{}\"", name),
        timestamp: stamp(event, now),
        read: false,
        source: NotificationSource::BiddingStarted {
            auction: event.id.clone(),
        },
    }
}

fn bidding_ended(event: &DomainEvent, name: &str, bid_count: u32, now: Timestamp) -> Notification {
    let kind = NotificationKind::BiddingEnded;
    Notification {
        id: NotificationId::derive(event.stream(), &event.id, kind),
        kind,
        title: "Bidding Ended".to_string(),
        message: format!("Bidding on \"{}\" closed with {} bids", name, bid_count),
        timestamp: stamp(event, now),
        read: false,
        source: NotificationSource::BiddingEnded {
            auction: event.id.clone(),
            bid_count,
        },
    }
}

fn invoice_pending(
    event: &DomainEvent,
    invoice_number: Option<&str>,
    status: InvoiceStatus,
    now: Timestamp,
) -> Notification {
    let number = match invoice_number {
        Some(number) if !number.is_empty() => number.to_string(),
        _ => event.id.short(),
    };
    let kind = NotificationKind::InvoicePending;
    Notification {
        id: NotificationId::derive(event.stream(), &event.id, kind),
        kind,
        title: "Invoice Pending".to_string(),
        message: format!("Invoice {} is {}", number, status),
        timestamp: stamp(event, now),
        read: false,
        source: NotificationSource::InvoicePending {
            invoice: event.id.clone(),
            invoice_number: invoice_number.map(str::to_string),
            status,
        },
    }
}

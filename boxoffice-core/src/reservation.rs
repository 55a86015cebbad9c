use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::{LedgerError, LedgerResult};

/// Reservation lifecycle. `Confirmed` and `Cancelled` are sinks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether the reservation's tickets still count as sold.
    pub fn holds_tickets(&self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReservationStatus::Pending),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            other => Err(LedgerError::Storage(format!("unknown reservation status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(PaymentStatus::Unpaid),
            "PAID" => Ok(PaymentStatus::Paid),
            other => Err(LedgerError::Storage(format!("unknown payment status {other:?}"))),
        }
    }
}

/// One buyer's claim on a quantity of tickets for an event.
///
/// Prices are in minor currency units. `unit_price` is the snapshot taken
/// when the reservation was placed and is never re-read from the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: Uuid,
    pub event_id: Uuid,
    pub buyer_id: String,
    pub ticket_count: i32,
    pub unit_price: i64,
    pub total_price: i64,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub reserved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Build a fresh `Pending`/`Unpaid` reservation. Only ledgers call this,
    /// from inside the atomic unit that also decrements availability.
    pub fn new(event_id: Uuid, buyer_id: &str, ticket_count: i32, unit_price: i64) -> LedgerResult<Self> {
        validate_request(buyer_id, ticket_count)?;
        let total_price = total_price(ticket_count, unit_price)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            event_id,
            buyer_id: buyer_id.to_string(),
            ticket_count,
            unit_price,
            total_price,
            status: ReservationStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            reserved_at: now,
            updated_at: now,
        })
    }

    /// Transition: Pending → Cancelled.
    ///
    /// Acts as the compare-and-set guarding Release: a second cancel reports
    /// `AlreadyCancelled` and leaves the record untouched.
    pub fn cancel(&mut self) -> LedgerResult<()> {
        match self.status {
            ReservationStatus::Pending => {
                self.update_status(ReservationStatus::Cancelled);
                Ok(())
            }
            ReservationStatus::Cancelled => Err(LedgerError::AlreadyCancelled(self.id)),
            ReservationStatus::Confirmed => Err(LedgerError::InvalidTransition {
                from: self.status,
                to: ReservationStatus::Cancelled,
            }),
        }
    }

    /// Transition: Pending → Confirmed, marking the reservation paid.
    pub fn confirm_payment(&mut self) -> LedgerResult<()> {
        match self.status {
            ReservationStatus::Pending => {
                self.payment_status = PaymentStatus::Paid;
                self.update_status(ReservationStatus::Confirmed);
                Ok(())
            }
            ReservationStatus::Cancelled => Err(LedgerError::AlreadyCancelled(self.id)),
            ReservationStatus::Confirmed => Err(LedgerError::InvalidTransition {
                from: self.status,
                to: ReservationStatus::Confirmed,
            }),
        }
    }

    fn update_status(&mut self, new_status: ReservationStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

/// Checks shared by every ledger before any lock is taken.
pub fn validate_request(buyer_id: &str, ticket_count: i32) -> LedgerResult<()> {
    if ticket_count <= 0 {
        return Err(LedgerError::Validation(format!(
            "ticket_count must be positive, got {ticket_count}"
        )));
    }
    if buyer_id.trim().is_empty() {
        return Err(LedgerError::Validation("buyer_id must not be empty".to_string()));
    }
    Ok(())
}

/// Flat pricing: `ticket_count * unit_price`.
pub fn total_price(ticket_count: i32, unit_price: i64) -> LedgerResult<i64> {
    i64::from(ticket_count)
        .checked_mul(unit_price)
        .ok_or_else(|| LedgerError::Validation("total price overflows".to_string()))
}

use boxoffice_core::{EventInventory, Reservation};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    ReservationPlaced,
    ReservationCancelled,
    PaymentConfirmed,
    CapacityChanged,
}

impl LedgerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEventKind::ReservationPlaced => "reservation_placed",
            LedgerEventKind::ReservationCancelled => "reservation_cancelled",
            LedgerEventKind::PaymentConfirmed => "payment_confirmed",
            LedgerEventKind::CapacityChanged => "capacity_changed",
        }
    }
}

/// Notification emitted after a ledger mutation has committed.
///
/// `available` is the count observed right after the commit and may already
/// be stale by the time a subscriber reads it.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct LedgerEvent {
    pub kind: LedgerEventKind,
    pub event_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub ticket_count: Option<i32>,
    pub available: Option<i32>,
    pub timestamp: i64,
}

impl LedgerEvent {
    pub fn from_reservation(kind: LedgerEventKind, reservation: &Reservation, available: Option<i32>) -> Self {
        Self {
            kind,
            event_id: reservation.event_id,
            reservation_id: Some(reservation.id),
            ticket_count: Some(reservation.ticket_count),
            available,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn capacity_changed(inventory: &EventInventory) -> Self {
        Self {
            kind: LedgerEventKind::CapacityChanged,
            event_id: inventory.event_id,
            reservation_id: None,
            ticket_count: None,
            available: Some(inventory.available),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

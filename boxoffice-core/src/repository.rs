use async_trait::async_trait;
use uuid::Uuid;

use crate::inventory::EventInventory;
use crate::reservation::Reservation;
use crate::LedgerResult;

/// The authoritative record of each event's sellable capacity.
///
/// Every mutating method is one atomic unit: it either applies all of its
/// writes or none of them, and operations on the same event are totally
/// ordered by an exclusive per-event lock. Operations on different events
/// never wait on each other.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Register a new event with `available = total_capacity`.
    async fn create_event(
        &self,
        total_capacity: i32,
        unit_price: i64,
    ) -> LedgerResult<EventInventory>;

    /// Change an event's total capacity without touching sold tickets.
    async fn resize_capacity(
        &self,
        event_id: Uuid,
        total_capacity: i32,
    ) -> LedgerResult<EventInventory>;

    /// Allocate `ticket_count` tickets and record a pending reservation.
    ///
    /// Fails with `InsufficientInventory` (reporting what is left) rather
    /// than allocating part of the request.
    async fn reserve(
        &self,
        event_id: Uuid,
        buyer_id: &str,
        ticket_count: i32,
    ) -> LedgerResult<Reservation>;

    /// Cancel a pending reservation and credit its tickets back exactly once.
    async fn release(
        &self,
        reservation_id: Uuid,
    ) -> LedgerResult<Reservation>;

    /// Mark a pending reservation confirmed and paid. No inventory effect.
    async fn confirm_payment(
        &self,
        reservation_id: Uuid,
    ) -> LedgerResult<Reservation>;

    async fn get_inventory(
        &self,
        event_id: Uuid,
    ) -> LedgerResult<EventInventory>;

    async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> LedgerResult<Reservation>;

    /// All reservations for an event, oldest first.
    async fn list_reservations(
        &self,
        event_id: Uuid,
    ) -> LedgerResult<Vec<Reservation>>;
}

use async_trait::async_trait;
use boxoffice_core::{EventInventory, InventoryLedger, LedgerError, LedgerResult, Reservation};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything guarded by one event's lock.
struct EventSlot {
    inventory: EventInventory,
    reservations: HashMap<Uuid, Reservation>,
}

/// In-process ledger.
///
/// Each event lives behind its own async mutex, so check-and-decrement on one
/// event is serialized while other events proceed in parallel. Mutations run
/// only after the last `.await` of an operation; a caller that drops the
/// future earlier leaves no trace.
pub struct InventoryManager {
    events: RwLock<HashMap<Uuid, Arc<Mutex<EventSlot>>>>,
    // reservation id -> event id
    index: RwLock<HashMap<Uuid, Uuid>>,
    lock_timeout: Duration,
}

impl InventoryManager {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    async fn slot(&self, event_id: Uuid) -> LedgerResult<Arc<Mutex<EventSlot>>> {
        self.events
            .read()
            .await
            .get(&event_id)
            .cloned()
            .ok_or(LedgerError::EventNotFound(event_id))
    }

    async fn lock<'a>(&self, slot: &'a Mutex<EventSlot>, event_id: Uuid) -> LedgerResult<MutexGuard<'a, EventSlot>> {
        tokio::time::timeout(self.lock_timeout, slot.lock())
            .await
            .map_err(|_| {
                warn!("Timed out waiting for inventory lock on event {}", event_id);
                LedgerError::Storage(format!("lock timeout on event {event_id}"))
            })
    }

    async fn event_of(&self, reservation_id: Uuid) -> LedgerResult<Uuid> {
        self.index
            .read()
            .await
            .get(&reservation_id)
            .copied()
            .ok_or(LedgerError::ReservationNotFound(reservation_id))
    }
}

impl Default for InventoryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryLedger for InventoryManager {
    async fn create_event(&self, total_capacity: i32, unit_price: i64) -> LedgerResult<EventInventory> {
        let inventory = EventInventory::new(total_capacity, unit_price)?;
        let slot = EventSlot {
            inventory: inventory.clone(),
            reservations: HashMap::new(),
        };
        self.events
            .write()
            .await
            .insert(inventory.event_id, Arc::new(Mutex::new(slot)));

        info!("Event {} created with capacity {}", inventory.event_id, total_capacity);
        Ok(inventory)
    }

    async fn resize_capacity(&self, event_id: Uuid, total_capacity: i32) -> LedgerResult<EventInventory> {
        let slot = self.slot(event_id).await?;
        let mut guard = self.lock(&slot, event_id).await?;

        guard.inventory.resize(total_capacity)?;
        info!("Event {} resized to {} (available {})", event_id, total_capacity, guard.inventory.available);
        Ok(guard.inventory.clone())
    }

    async fn reserve(&self, event_id: Uuid, buyer_id: &str, ticket_count: i32) -> LedgerResult<Reservation> {
        boxoffice_core::reservation::validate_request(buyer_id, ticket_count)?;

        let slot = self.slot(event_id).await?;
        let mut guard = self.lock(&slot, event_id).await?;

        let available = guard.inventory.available;
        if available < ticket_count {
            warn!("Reserve rejected for event {}: requested {}, available {}", event_id, ticket_count, available);
            return Err(LedgerError::InsufficientInventory {
                requested: ticket_count,
                available,
            });
        }
        let reservation = Reservation::new(event_id, buyer_id, ticket_count, guard.inventory.unit_price)?;

        // Last await; nothing below can fail or yield.
        let mut index = self.index.write().await;

        guard.inventory.take(ticket_count)?;
        guard.reservations.insert(reservation.id, reservation.clone());
        index.insert(reservation.id, event_id);

        info!(
            "Reservation {} placed for event {}: {} tickets (available {})",
            reservation.id, event_id, ticket_count, guard.inventory.available
        );
        Ok(reservation)
    }

    async fn release(&self, reservation_id: Uuid) -> LedgerResult<Reservation> {
        let event_id = self.event_of(reservation_id).await?;
        let slot = self.slot(event_id).await?;
        let mut guard = self.lock(&slot, event_id).await?;
        let EventSlot { inventory, reservations } = &mut *guard;

        let reservation = reservations
            .get_mut(&reservation_id)
            .ok_or(LedgerError::ReservationNotFound(reservation_id))?;
        reservation.cancel()?;
        inventory.restore(reservation.ticket_count);

        info!(
            "Reservation {} released: {} tickets back to event {} (available {})",
            reservation_id, reservation.ticket_count, event_id, inventory.available
        );
        Ok(reservation.clone())
    }

    async fn confirm_payment(&self, reservation_id: Uuid) -> LedgerResult<Reservation> {
        let event_id = self.event_of(reservation_id).await?;
        let slot = self.slot(event_id).await?;
        let mut guard = self.lock(&slot, event_id).await?;

        let reservation = guard
            .reservations
            .get_mut(&reservation_id)
            .ok_or(LedgerError::ReservationNotFound(reservation_id))?;
        reservation.confirm_payment()?;

        info!("Reservation {} confirmed", reservation_id);
        Ok(reservation.clone())
    }

    async fn get_inventory(&self, event_id: Uuid) -> LedgerResult<EventInventory> {
        let slot = self.slot(event_id).await?;
        let guard = self.lock(&slot, event_id).await?;
        Ok(guard.inventory.clone())
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> LedgerResult<Reservation> {
        let event_id = self.event_of(reservation_id).await?;
        let slot = self.slot(event_id).await?;
        let guard = self.lock(&slot, event_id).await?;
        guard
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or(LedgerError::ReservationNotFound(reservation_id))
    }

    async fn list_reservations(&self, event_id: Uuid) -> LedgerResult<Vec<Reservation>> {
        let slot = self.slot(event_id).await?;
        let guard = self.lock(&slot, event_id).await?;
        let mut reservations: Vec<Reservation> = guard.reservations.values().cloned().collect();
        reservations.sort_by_key(|r| (r.reserved_at, r.id));
        Ok(reservations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::{PaymentStatus, ReservationStatus};

    async fn assert_reconciles(ledger: &InventoryManager, event_id: Uuid) {
        let inventory = ledger.get_inventory(event_id).await.unwrap();
        let reservations = ledger.list_reservations(event_id).await.unwrap();
        assert!(inventory.reconciles_with(&reservations), "ledger out of balance: {inventory:?}");
    }

    #[tokio::test]
    async fn test_purchase_and_cancel_scenario() {
        let ledger = InventoryManager::new();
        let event = ledger.create_event(100, 5000).await.unwrap();

        let first = ledger.reserve(event.event_id, "1", 40).await.unwrap();
        assert_eq!(first.total_price, 200_000);
        assert_eq!(first.status, ReservationStatus::Pending);
        assert_eq!(first.payment_status, PaymentStatus::Unpaid);
        assert_eq!(ledger.get_inventory(event.event_id).await.unwrap().available, 60);

        let err = ledger.reserve(event.event_id, "2", 70).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientInventory { requested: 70, available: 60 });

        let released = ledger.release(first.id).await.unwrap();
        assert_eq!(released.status, ReservationStatus::Cancelled);
        assert_eq!(ledger.get_inventory(event.event_id).await.unwrap().available, 100);
        assert_reconciles(&ledger, event.event_id).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserves_never_oversell() {
        let ledger = Arc::new(InventoryManager::new());
        let event_id = ledger.create_event(10, 100).await.unwrap().event_id;

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.reserve(event_id, &format!("buyer-{i}"), 1).await
            }));
        }

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientInventory { available: 0, .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(rejected, 10);
        assert_eq!(ledger.get_inventory(event_id).await.unwrap().available, 0);
        assert_reconciles(&ledger, event_id).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mixed_quantities() {
        let ledger = Arc::new(InventoryManager::new());
        let event_id = ledger.create_event(50, 100).await.unwrap().event_id;

        let mut handles = Vec::new();
        for i in 0..40 {
            let ledger = Arc::clone(&ledger);
            let quantity = (i % 4) + 1;
            handles.push(tokio::spawn(async move {
                ledger.reserve(event_id, "buyer", quantity).await
            }));
        }

        let mut sold = 0;
        for handle in handles {
            if let Ok(reservation) = handle.await.unwrap() {
                sold += reservation.ticket_count;
            }
        }

        let inventory = ledger.get_inventory(event_id).await.unwrap();
        assert!(sold <= 50);
        assert_eq!(inventory.available, 50 - sold);
        assert_reconciles(&ledger, event_id).await;
    }

    #[tokio::test]
    async fn test_double_release_credits_once() {
        let ledger = InventoryManager::new();
        let event_id = ledger.create_event(10, 100).await.unwrap().event_id;
        let reservation = ledger.reserve(event_id, "buyer", 4).await.unwrap();

        ledger.release(reservation.id).await.unwrap();
        let err = ledger.release(reservation.id).await.unwrap_err();
        assert_eq!(err, LedgerError::AlreadyCancelled(reservation.id));
        assert_eq!(ledger.get_inventory(event_id).await.unwrap().available, 10);
    }

    #[tokio::test]
    async fn test_round_trip_restores_availability() {
        let ledger = InventoryManager::new();
        let event_id = ledger.create_event(25, 100).await.unwrap().event_id;
        ledger.reserve(event_id, "early", 5).await.unwrap();
        let before = ledger.get_inventory(event_id).await.unwrap().available;

        let reservation = ledger.reserve(event_id, "buyer", 3).await.unwrap();
        ledger.release(reservation.id).await.unwrap();

        assert_eq!(ledger.get_inventory(event_id).await.unwrap().available, before);
    }

    #[tokio::test]
    async fn test_boundary_quantities() {
        let ledger = InventoryManager::new();
        let event_id = ledger.create_event(8, 100).await.unwrap().event_id;

        let err = ledger.reserve(event_id, "buyer", 9).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientInventory { requested: 9, available: 8 });

        ledger.reserve(event_id, "buyer", 8).await.unwrap();
        assert_eq!(ledger.get_inventory(event_id).await.unwrap().available, 0);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let ledger = InventoryManager::new();
        let missing = Uuid::new_v4();

        assert_eq!(
            ledger.reserve(missing, "buyer", 1).await.unwrap_err(),
            LedgerError::EventNotFound(missing)
        );
        assert_eq!(
            ledger.release(missing).await.unwrap_err(),
            LedgerError::ReservationNotFound(missing)
        );
        assert_eq!(
            ledger.resize_capacity(missing, 10).await.unwrap_err(),
            LedgerError::EventNotFound(missing)
        );
        assert!(ledger.list_reservations(missing).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_quantity_checked_before_lookup() {
        let ledger = InventoryManager::new();
        let err = ledger.reserve(Uuid::new_v4(), "buyer", 0).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_confirmed_reservation_keeps_tickets() {
        let ledger = InventoryManager::new();
        let event_id = ledger.create_event(10, 100).await.unwrap().event_id;
        let reservation = ledger.reserve(event_id, "buyer", 2).await.unwrap();

        let confirmed = ledger.confirm_payment(reservation.id).await.unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

        let err = ledger.release(reservation.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(ledger.get_inventory(event_id).await.unwrap().available, 8);
        assert_reconciles(&ledger, event_id).await;
    }

    #[tokio::test]
    async fn test_resize_respects_sold_tickets() {
        let ledger = InventoryManager::new();
        let event_id = ledger.create_event(10, 100).await.unwrap().event_id;
        ledger.reserve(event_id, "buyer", 7).await.unwrap();

        let err = ledger.resize_capacity(event_id, 6).await.unwrap_err();
        assert_eq!(err, LedgerError::CapacityBelowSold { requested: 6, sold: 7 });

        let resized = ledger.resize_capacity(event_id, 15).await.unwrap();
        assert_eq!(resized.available, 8);
        assert_reconciles(&ledger, event_id).await;
    }

    #[tokio::test]
    async fn test_other_events_do_not_wait() {
        let ledger = InventoryManager::with_lock_timeout(Duration::from_millis(50));
        let busy = ledger.create_event(10, 100).await.unwrap().event_id;
        let idle = ledger.create_event(10, 100).await.unwrap().event_id;

        let slot = ledger.slot(busy).await.unwrap();
        let _held = slot.lock().await;

        ledger.reserve(idle, "buyer", 1).await.unwrap();
        let err = ledger.reserve(busy, "buyer", 1).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_reserve_has_no_effect() {
        let ledger = Arc::new(InventoryManager::new());
        let event_id = ledger.create_event(10, 100).await.unwrap().event_id;

        let slot = ledger.slot(event_id).await.unwrap();
        let held = slot.lock().await;

        let pending = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.reserve(event_id, "buyer", 3).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        drop(held);

        assert_eq!(ledger.get_inventory(event_id).await.unwrap().available, 10);
        assert!(ledger.list_reservations(event_id).await.unwrap().is_empty());
    }
}

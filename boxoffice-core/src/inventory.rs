use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::reservation::Reservation;
use crate::{LedgerError, LedgerResult};

/// The ledger row for one event: how many tickets exist and how many are left.
///
/// `0 <= available <= total_capacity` holds for every value handed out by a
/// ledger. The `take`/`restore`/`resize` helpers are pure arithmetic; callers
/// are responsible for running them under the event's lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventInventory {
    pub event_id: Uuid,
    pub total_capacity: i32,
    pub available: i32,
    /// Flat per-ticket price in minor currency units.
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventInventory {
    pub fn new(total_capacity: i32, unit_price: i64) -> LedgerResult<Self> {
        if total_capacity < 0 {
            return Err(LedgerError::Validation(format!(
                "total_capacity must not be negative, got {total_capacity}"
            )));
        }
        if unit_price < 0 {
            return Err(LedgerError::Validation(format!(
                "unit_price must not be negative, got {unit_price}"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            event_id: Uuid::new_v4(),
            total_capacity,
            available: total_capacity,
            unit_price,
            created_at: now,
            updated_at: now,
        })
    }

    /// Tickets held by pending or confirmed reservations.
    pub fn sold(&self) -> i32 {
        self.total_capacity - self.available
    }

    /// Check-and-decrement. Leaves `self` untouched on failure.
    pub fn take(&mut self, quantity: i32) -> LedgerResult<()> {
        if self.available < quantity {
            return Err(LedgerError::InsufficientInventory {
                requested: quantity,
                available: self.available,
            });
        }
        self.available -= quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Credit back a cancelled reservation's tickets.
    ///
    /// Each reservation is debited once and can be credited once, so this
    /// never pushes `available` past `total_capacity` as long as the caller
    /// went through `Reservation::cancel` first.
    pub fn restore(&mut self, quantity: i32) {
        self.available += quantity;
        self.updated_at = Utc::now();
    }

    /// Change total capacity, shifting `available` by the same delta.
    pub fn resize(&mut self, new_total: i32) -> LedgerResult<()> {
        if new_total < 0 {
            return Err(LedgerError::Validation(format!(
                "total_capacity must not be negative, got {new_total}"
            )));
        }
        let sold = self.sold();
        if new_total < sold {
            return Err(LedgerError::CapacityBelowSold {
                requested: new_total,
                sold,
            });
        }
        self.available = new_total - sold;
        self.total_capacity = new_total;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `available + Σ ticket_count(non-cancelled) == total_capacity`.
    pub fn reconciles_with(&self, reservations: &[Reservation]) -> bool {
        let held: i64 = reservations
            .iter()
            .filter(|r| r.event_id == self.event_id && r.status.holds_tickets())
            .map(|r| i64::from(r.ticket_count))
            .sum();
        i64::from(self.available) + held == i64::from(self.total_capacity)
            && self.available >= 0
            && self.available <= self.total_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_lifecycle() {
        let mut inventory = EventInventory::new(100, 5000).unwrap();
        assert_eq!(inventory.available, 100);

        inventory.take(40).unwrap();
        assert_eq!(inventory.available, 60);
        assert_eq!(inventory.sold(), 40);

        let err = inventory.take(70).unwrap_err();
        assert_eq!(err, LedgerError::InsufficientInventory { requested: 70, available: 60 });
        assert_eq!(inventory.available, 60);

        inventory.restore(40);
        assert_eq!(inventory.available, 100);
    }

    #[test]
    fn test_take_exactly_available() {
        let mut inventory = EventInventory::new(5, 100).unwrap();
        inventory.take(5).unwrap();
        assert_eq!(inventory.available, 0);
        assert!(inventory.take(1).is_err());
    }

    #[test]
    fn test_resize_keeps_sold_tickets() {
        let mut inventory = EventInventory::new(10, 100).unwrap();
        inventory.take(6).unwrap();

        inventory.resize(20).unwrap();
        assert_eq!(inventory.total_capacity, 20);
        assert_eq!(inventory.available, 14);

        inventory.resize(6).unwrap();
        assert_eq!(inventory.available, 0);

        let err = inventory.resize(5).unwrap_err();
        assert_eq!(err, LedgerError::CapacityBelowSold { requested: 5, sold: 6 });
        assert_eq!(inventory.total_capacity, 6);
    }

    #[test]
    fn test_rejects_negative_inputs() {
        assert!(EventInventory::new(-1, 100).is_err());
        assert!(EventInventory::new(10, -1).is_err());
        assert!(EventInventory::new(0, 0).is_ok());
    }

    #[test]
    fn test_reconciliation() {
        let mut inventory = EventInventory::new(10, 100).unwrap();
        let mut first = Reservation::new(inventory.event_id, "a", 3, 100).unwrap();
        let second = Reservation::new(inventory.event_id, "b", 2, 100).unwrap();
        inventory.take(3).unwrap();
        inventory.take(2).unwrap();
        assert!(inventory.reconciles_with(&[first.clone(), second.clone()]));

        first.cancel().unwrap();
        assert!(!inventory.reconciles_with(&[first.clone(), second.clone()]));
        inventory.restore(first.ticket_count);
        assert!(inventory.reconciles_with(&[first, second]));
    }

    #[test]
    fn test_resize_rejects_negative_capacity() {
        let mut inventory = EventInventory::new(10, 100).unwrap();
        let err = inventory.resize(-5).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(inventory.total_capacity, 10);
        assert_eq!(inventory.available, 10);
    }
}

pub mod inventory;
pub mod reservation;
pub mod repository;

pub use inventory::EventInventory;
pub use reservation::{PaymentStatus, Reservation, ReservationStatus};
pub use repository::InventoryLedger;

use uuid::Uuid;

/// Every way a ledger operation can fail.
///
/// All variants are scoped to a single request: the enclosing atomic unit has
/// already been rolled back by the time one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(Uuid),

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: i32,
        available: i32,
    },

    #[error("Reservation already cancelled: {0}")]
    AlreadyCancelled(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("Capacity {requested} is below the {sold} tickets already sold")]
    CapacityBelowSold {
        requested: i32,
        sold: i32,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Only storage failures are worth retrying; the unit left no partial state behind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let id = Uuid::new_v4();
        assert!(!LedgerError::EventNotFound(id).is_retryable());
        assert!(LedgerError::Storage("lock timeout".to_string()).is_retryable());
        assert!(!LedgerError::InsufficientInventory { requested: 2, available: 1 }.is_retryable());
    }

    #[test]
    fn test_insufficient_inventory_message() {
        let err = LedgerError::InsufficientInventory { requested: 70, available: 60 };
        assert_eq!(err.to_string(), "Insufficient inventory: requested 70, available 60");
    }
}

use std::sync::Arc;
use boxoffice_core::{InventoryLedger, Reservation};
use boxoffice_shared::{LedgerEvent, LedgerEventKind};
use boxoffice_store::app_config::RateLimitConfig;
use boxoffice_store::RedisClient;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn InventoryLedger>,
    pub ledger_tx: broadcast::Sender<LedgerEvent>,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(ledger: Arc<dyn InventoryLedger>) -> Self {
        let (ledger_tx, _) = broadcast::channel(100);
        Self {
            ledger,
            ledger_tx,
            redis: None,
            rate_limit: RateLimitConfig::default(),
        }
    }

    pub fn with_rate_limiter(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }

    /// Fan a committed reservation change out to stream subscribers.
    ///
    /// Called after the ledger call has returned, so no ledger lock is held.
    pub async fn publish_reservation(&self, kind: LedgerEventKind, reservation: &Reservation) {
        if self.ledger_tx.receiver_count() == 0 {
            return;
        }
        let available = self
            .ledger
            .get_inventory(reservation.event_id)
            .await
            .map(|inventory| inventory.available)
            .ok();
        self.publish(LedgerEvent::from_reservation(kind, reservation, available));
    }

    pub fn publish(&self, event: LedgerEvent) {
        // Err only means nobody is listening
        let _ = self.ledger_tx.send(event);
    }
}

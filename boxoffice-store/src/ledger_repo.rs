use async_trait::async_trait;
use boxoffice_core::reservation::validate_request;
use boxoffice_core::{EventInventory, InventoryLedger, LedgerError, LedgerResult, Reservation};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Postgres SQLSTATE for `lock_not_available`, raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Durable ledger backed by the `events` and `reservations` tables.
///
/// Each operation runs in one transaction and serializes on
/// `SELECT ... FOR UPDATE` row locks. When a row of both tables is needed the
/// reservation is locked before its event. Returning early drops the
/// transaction, which rolls it back.
pub struct PostgresLedger {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresLedger {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Scoped to this transaction only.
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        Ok(tx)
    }

    async fn lock_event(tx: &mut Transaction<'static, Postgres>, event_id: Uuid) -> LedgerResult<EventInventory> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, total_capacity, available, unit_price, created_at, updated_at
             FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?
        .map(EventInventory::from)
        .ok_or(LedgerError::EventNotFound(event_id))
    }

    async fn lock_reservation(tx: &mut Transaction<'static, Postgres>, reservation_id: Uuid) -> LedgerResult<Reservation> {
        sqlx::query_as::<_, ReservationRow>(
            "SELECT id, event_id, buyer_id, ticket_count, unit_price, total_price, status, payment_status, reserved_at, updated_at
             FROM reservations WHERE id = $1 FOR UPDATE",
        )
        .bind(reservation_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?
        .ok_or(LedgerError::ReservationNotFound(reservation_id))?
        .try_into()
    }

    async fn write_status(tx: &mut Transaction<'static, Postgres>, reservation: &Reservation) -> LedgerResult<()> {
        sqlx::query(
            "UPDATE reservations SET status = $1, payment_status = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(reservation.status.as_str())
        .bind(reservation.payment_status.as_str())
        .bind(reservation.updated_at)
        .bind(reservation.id)
        .execute(&mut **tx)
        .await
        .map_err(storage)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    total_capacity: i32,
    available: i32,
    unit_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for EventInventory {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.id,
            total_capacity: row.total_capacity,
            available: row.available,
            unit_price: row.unit_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    event_id: Uuid,
    buyer_id: String,
    ticket_count: i32,
    unit_price: i64,
    total_price: i64,
    status: String,
    payment_status: String,
    reserved_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = LedgerError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            event_id: row.event_id,
            buyer_id: row.buyer_id,
            ticket_count: row.ticket_count,
            unit_price: row.unit_price,
            total_price: row.total_price,
            status: row.status.parse()?,
            payment_status: row.payment_status.parse()?,
            reserved_at: row.reserved_at,
            updated_at: row.updated_at,
        })
    }
}

fn storage(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            warn!("Ledger lock wait timed out: {}", db_err);
            return LedgerError::Storage("lock timeout".to_string());
        }
    }
    error!("Ledger storage failure: {}", err);
    LedgerError::Storage(err.to_string())
}

#[async_trait]
impl InventoryLedger for PostgresLedger {
    async fn create_event(&self, total_capacity: i32, unit_price: i64) -> LedgerResult<EventInventory> {
        let inventory = EventInventory::new(total_capacity, unit_price)?;

        sqlx::query(
            r#"
            INSERT INTO events (id, total_capacity, available, unit_price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(inventory.event_id)
        .bind(inventory.total_capacity)
        .bind(inventory.available)
        .bind(inventory.unit_price)
        .bind(inventory.created_at)
        .bind(inventory.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        info!("Event {} created with capacity {}", inventory.event_id, total_capacity);
        Ok(inventory)
    }

    async fn resize_capacity(&self, event_id: Uuid, total_capacity: i32) -> LedgerResult<EventInventory> {
        let mut tx = self.begin().await?;
        let mut inventory = Self::lock_event(&mut tx, event_id).await?;

        inventory.resize(total_capacity)?;

        sqlx::query("UPDATE events SET total_capacity = $1, available = $2, updated_at = $3 WHERE id = $4")
            .bind(inventory.total_capacity)
            .bind(inventory.available)
            .bind(inventory.updated_at)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        info!("Event {} resized to {} (available {})", event_id, total_capacity, inventory.available);
        Ok(inventory)
    }

    async fn reserve(&self, event_id: Uuid, buyer_id: &str, ticket_count: i32) -> LedgerResult<Reservation> {
        validate_request(buyer_id, ticket_count)?;

        let mut tx = self.begin().await?;
        let mut inventory = Self::lock_event(&mut tx, event_id).await?;

        if let Err(err) = inventory.take(ticket_count) {
            warn!("Reserve rejected for event {}: {}", event_id, err);
            return Err(err);
        }
        let reservation = Reservation::new(event_id, buyer_id, ticket_count, inventory.unit_price)?;

        sqlx::query(
            r#"
            INSERT INTO reservations (id, event_id, buyer_id, ticket_count, unit_price, total_price, status, payment_status, reserved_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.event_id)
        .bind(reservation.buyer_id.as_str())
        .bind(reservation.ticket_count)
        .bind(reservation.unit_price)
        .bind(reservation.total_price)
        .bind(reservation.status.as_str())
        .bind(reservation.payment_status.as_str())
        .bind(reservation.reserved_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query("UPDATE events SET available = available - $1, updated_at = $2 WHERE id = $3")
            .bind(ticket_count)
            .bind(inventory.updated_at)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        info!(
            "Reservation {} placed for event {}: {} tickets (available {})",
            reservation.id, event_id, ticket_count, inventory.available
        );
        Ok(reservation)
    }

    async fn release(&self, reservation_id: Uuid) -> LedgerResult<Reservation> {
        let mut tx = self.begin().await?;
        let mut reservation = Self::lock_reservation(&mut tx, reservation_id).await?;
        let mut inventory = Self::lock_event(&mut tx, reservation.event_id).await?;

        reservation.cancel()?;
        inventory.restore(reservation.ticket_count);

        Self::write_status(&mut tx, &reservation).await?;
        sqlx::query("UPDATE events SET available = available + $1, updated_at = $2 WHERE id = $3")
            .bind(reservation.ticket_count)
            .bind(inventory.updated_at)
            .bind(reservation.event_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        info!(
            "Reservation {} released: {} tickets back to event {} (available {})",
            reservation_id, reservation.ticket_count, reservation.event_id, inventory.available
        );
        Ok(reservation)
    }

    async fn confirm_payment(&self, reservation_id: Uuid) -> LedgerResult<Reservation> {
        let mut tx = self.begin().await?;
        let mut reservation = Self::lock_reservation(&mut tx, reservation_id).await?;

        reservation.confirm_payment()?;
        Self::write_status(&mut tx, &reservation).await?;

        tx.commit().await.map_err(storage)?;

        info!("Reservation {} confirmed", reservation_id);
        Ok(reservation)
    }

    async fn get_inventory(&self, event_id: Uuid) -> LedgerResult<EventInventory> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, total_capacity, available, unit_price, created_at, updated_at FROM events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .map(EventInventory::from)
        .ok_or(LedgerError::EventNotFound(event_id))
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> LedgerResult<Reservation> {
        sqlx::query_as::<_, ReservationRow>(
            "SELECT id, event_id, buyer_id, ticket_count, unit_price, total_price, status, payment_status, reserved_at, updated_at
             FROM reservations WHERE id = $1",
        )
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or(LedgerError::ReservationNotFound(reservation_id))?
        .try_into()
    }

    async fn list_reservations(&self, event_id: Uuid) -> LedgerResult<Vec<Reservation>> {
        // Surface NotFound rather than an empty list for unknown events
        self.get_inventory(event_id).await?;

        let rows: Vec<ReservationRow> = sqlx::query_as(
            "SELECT id, event_id, buyer_id, ticket_count, unit_price, total_price, status, payment_status, reserved_at, updated_at
             FROM reservations WHERE event_id = $1 ORDER BY reserved_at, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(Reservation::try_from).collect()
    }
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use boxoffice_core::Reservation;
use boxoffice_shared::LedgerEventKind;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub event_id: Uuid,
    pub buyer_id: String,
    pub ticket_count: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route("/v1/reservations/{reservation_id}", get(get_reservation))
        .route("/v1/reservations/{reservation_id}/cancel", put(cancel_reservation))
        .route("/v1/reservations/{reservation_id}/confirm-payment", put(confirm_payment))
}

/// POST /v1/reservations
/// Reserve tickets; never oversells
async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state
        .ledger
        .reserve(req.event_id, &req.buyer_id, req.ticket_count)
        .await?;

    state.publish_reservation(LedgerEventKind::ReservationPlaced, &reservation).await;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /v1/reservations/{reservation_id}
async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.ledger.get_reservation(reservation_id).await?))
}

/// PUT /v1/reservations/{reservation_id}/cancel
/// Return the tickets to the event's pool
async fn cancel_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.ledger.release(reservation_id).await?;

    state.publish_reservation(LedgerEventKind::ReservationCancelled, &reservation).await;
    Ok(Json(reservation))
}

/// PUT /v1/reservations/{reservation_id}/confirm-payment
async fn confirm_payment(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.ledger.confirm_payment(reservation_id).await?;

    state.publish_reservation(LedgerEventKind::PaymentConfirmed, &reservation).await;
    Ok(Json(reservation))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use boxoffice_core::{EventInventory, Reservation};
use boxoffice_shared::LedgerEvent;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub total_capacity: i32,
    /// Minor currency units per ticket.
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct ResizeCapacityRequest {
    pub total_capacity: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events", post(create_event))
        .route("/v1/events/{event_id}", get(get_event))
        .route("/v1/events/{event_id}/capacity", put(resize_capacity))
        .route("/v1/events/{event_id}/reservations", get(list_reservations))
        .route("/v1/events/{event_id}/stream", get(stream_event))
}

/// POST /v1/events
async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventInventory>), AppError> {
    let inventory = state.ledger.create_event(req.total_capacity, req.unit_price).await?;
    Ok((StatusCode::CREATED, Json(inventory)))
}

/// GET /v1/events/{event_id}
async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventInventory>, AppError> {
    Ok(Json(state.ledger.get_inventory(event_id).await?))
}

/// PUT /v1/events/{event_id}/capacity
async fn resize_capacity(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<ResizeCapacityRequest>,
) -> Result<Json<EventInventory>, AppError> {
    let inventory = state.ledger.resize_capacity(event_id, req.total_capacity).await?;
    state.publish(LedgerEvent::capacity_changed(&inventory));
    Ok(Json(inventory))
}

/// GET /v1/events/{event_id}/reservations
async fn list_reservations(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    Ok(Json(state.ledger.list_reservations(event_id).await?))
}

/// GET /v1/events/{event_id}/stream
///
/// Server-sent events for every committed change to this event's inventory.
async fn stream_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.ledger.get_inventory(event_id).await?;

    let rx = state.ledger_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.event_id == event_id => Event::default()
                .event(event.kind.as_str())
                .json_data(&event)
                .ok()
                .map(Ok),
            // Lagged receivers just skip ahead
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

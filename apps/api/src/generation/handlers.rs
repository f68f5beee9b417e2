//! Axum route handlers for the floor-plan API.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::AppError;
use crate::generation::boundary::BoundaryShape;
use crate::generation::generator::{
    generate_floor_plan, layout_saved_tree, prepare_request, stream_floor_plan, FloorPlanResponse,
    GenerateRequest, PlanEvent,
};
use crate::partition::RoomRecord;
use crate::state::AppState;

/// Chunk events buffered ahead of a slow client before the model read pauses.
const EVENT_BUFFER: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub tree: Value,
    #[serde(default)]
    pub boundary_data: Vec<BoundaryShape>,
}

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub rooms: Vec<RoomRecord>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/generate-floor-plan
///
/// Runs the whole pipeline on a single model completion.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<FloorPlanResponse>, AppError> {
    let response = generate_floor_plan(request, state.model.as_ref(), &state.plan_settings).await?;
    Ok(Json(response))
}

/// POST /api/generate-floor-plan/stream
///
/// Input is validated before the stream opens, so bad requests still get a
/// plain JSON error. After that every outcome arrives as an SSE event.
/// Dropping the connection drops the receiver, which stops the model read.
pub async fn handle_generate_stream(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let prepared = prepare_request(&request)?;
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(stream_floor_plan(
        request,
        prepared,
        state.model.clone(),
        state.plan_settings,
        tx,
    ));

    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((sse_event(&event), rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /api/layout
///
/// Lays out a previously extracted tree without calling the model.
pub async fn handle_layout(
    State(state): State<AppState>,
    Json(request): Json<LayoutRequest>,
) -> Result<Json<LayoutResponse>, AppError> {
    let rooms = layout_saved_tree(&request.tree, &request.boundary_data, &state.plan_settings)?;
    Ok(Json(LayoutResponse { rooms }))
}

fn sse_event(event: &PlanEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.name()).json_data(event)
}

//! Floor-plan generation: orchestrates the full pipeline.
//!
//! Flow: validate input → summarize boundary → build prompt → model call
//!       (whole or streamed) → extract JSON → normalize tree → layout.
//!
//! An extraction failure is not an error here. It produces a degraded
//! `FloorPlan::Raw` and the request still succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{
    drain_stream, extract_payload, ChunkEvent, ExtractionMethod, StrategyFailure,
};
use crate::generation::boundary::{bounding_rectangle, summarize_boundary, BoundaryShape};
use crate::generation::prompts::{build_floor_plan_prompt, FLOOR_PLAN_SYSTEM};
use crate::llm_client::{LlmError, PlanModel};
use crate::partition::{layout, normalize_tree, PlanSettings, Rectangle, RoomRecord};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Request body shared by the streaming and non-streaming endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub boundary_data: Vec<BoundaryShape>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub preferences: Option<Value>,
}

/// A request that passed input validation, ready for the model.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub request_id: Uuid,
    /// Root rectangle for the layout engine.
    pub rect: Rectangle,
    pub prompt: String,
}

/// The plan itself: either laid-out rooms or the raw text the model produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FloorPlan {
    Structured {
        thinking_steps: String,
        json_result: Value,
        extraction_method: ExtractionMethod,
        rooms: Vec<RoomRecord>,
    },
    Raw {
        raw_response: String,
        failures: Vec<StrategyFailure>,
    },
}

impl FloorPlan {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FloorPlan::Raw { .. })
    }

    pub fn message(&self) -> String {
        match self {
            FloorPlan::Structured { rooms, .. } => {
                format!("Successfully generated floor plan with {} rooms", rooms.len())
            }
            FloorPlan::Raw { raw_response, .. } if raw_response.trim().is_empty() => {
                "Model output was empty; no JSON object to extract".to_string()
            }
            FloorPlan::Raw { .. } => "Generated response without valid JSON structure".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FloorPlanResponse {
    pub message: String,
    pub degraded: bool,
    pub floor_plan: FloorPlan,
    pub boundary_data: Vec<BoundaryShape>,
    pub description: String,
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl FloorPlanResponse {
    fn new(request_id: Uuid, request: GenerateRequest, floor_plan: FloorPlan) -> Self {
        Self {
            message: floor_plan.message(),
            degraded: floor_plan.is_degraded(),
            floor_plan,
            boundary_data: request.boundary_data,
            description: request.description,
            request_id,
            generated_at: Utc::now(),
        }
    }
}

/// One Server-Sent Event of the streaming endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    Chunk {
        content: String,
        accumulated: String,
    },
    Final(Box<FloorPlanResponse>),
    Error {
        error_kind: &'static str,
        message: String,
    },
}

impl PlanEvent {
    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            PlanEvent::Chunk { .. } => "chunk",
            PlanEvent::Final(_) => "final",
            PlanEvent::Error { .. } => "error",
        }
    }

    fn from_error(err: &AppError) -> Self {
        PlanEvent::Error {
            error_kind: err.kind(),
            message: err.client_message(),
        }
    }
}

impl From<ChunkEvent> for PlanEvent {
    fn from(event: ChunkEvent) -> Self {
        PlanEvent::Chunk {
            content: event.content,
            accumulated: event.accumulated,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline stages
// ────────────────────────────────────────────────────────────────────────────

/// Checks the request and builds the prompt. Fails with `AppError::Input`
/// before any model call is made.
pub fn prepare_request(request: &GenerateRequest) -> Result<PreparedRequest, AppError> {
    if request.description.trim().is_empty() {
        return Err(AppError::Input("Missing text description".to_string()));
    }
    if request.boundary_data.is_empty() {
        return Err(AppError::Input("Missing boundary data".to_string()));
    }

    let rect = bounding_rectangle(&request.boundary_data).ok_or_else(|| {
        AppError::Input("Boundary data has no shape with positive width and height".to_string())
    })?;

    let summary = summarize_boundary(&request.boundary_data);
    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        total_area = summary.total_area,
        root_area = rect.area(),
        shapes_count = summary.shapes_count,
        "Processed boundary data"
    );

    Ok(PreparedRequest {
        request_id,
        rect,
        prompt: build_floor_plan_prompt(
            &request.description,
            &summary,
            request.preferences.as_ref(),
        ),
    })
}

/// Extraction → validation → layout over completed (or partial) model text.
pub fn plan_from_text(
    text: String,
    rect: Rectangle,
    settings: &PlanSettings,
) -> Result<FloorPlan, AppError> {
    let payload = extract_payload(&text);

    let (Some(json_result), Some(extraction_method)) =
        (payload.json_object, payload.extraction_method)
    else {
        return Ok(FloorPlan::Raw {
            raw_response: payload.raw_text,
            failures: payload.failures,
        });
    };

    let tree = normalize_tree(&json_result, settings)?;
    let rooms = layout(&tree, rect, settings.max_depth)?;
    debug!(rooms = rooms.len(), "Partition tree laid out");

    Ok(FloorPlan::Structured {
        thinking_steps: text,
        json_result,
        extraction_method,
        rooms,
    })
}

/// Lays out an already-extracted tree against a boundary.
pub fn layout_saved_tree(
    tree: &Value,
    boundary: &[BoundaryShape],
    settings: &PlanSettings,
) -> Result<Vec<RoomRecord>, AppError> {
    let rect = bounding_rectangle(boundary).ok_or_else(|| {
        AppError::Input("Boundary data has no shape with positive width and height".to_string())
    })?;
    let root = normalize_tree(tree, settings)?;
    Ok(layout(&root, rect, settings.max_depth)?)
}

// ────────────────────────────────────────────────────────────────────────────
// Drivers
// ────────────────────────────────────────────────────────────────────────────

/// Non-streaming generation. Model failures abort the request; an empty
/// completion is a degraded result rather than an error.
pub async fn generate_floor_plan(
    request: GenerateRequest,
    model: &dyn PlanModel,
    settings: &PlanSettings,
) -> Result<FloorPlanResponse, AppError> {
    let prepared = prepare_request(&request)?;
    let request_id = prepared.request_id;

    info!(%request_id, "Sending floor plan request to model");
    let text = match model.complete(FLOOR_PLAN_SYSTEM, &prepared.prompt).await {
        Ok(text) => text,
        Err(LlmError::EmptyContent) => {
            warn!(%request_id, "Model returned no content");
            String::new()
        }
        Err(e) => {
            error!(%request_id, "Model call failed: {e}");
            return Err(e.into());
        }
    };
    info!(%request_id, chars = text.len(), "Received model response");

    let floor_plan = plan_from_text(text, prepared.rect, settings)?;
    Ok(FloorPlanResponse::new(request_id, request, floor_plan))
}

/// Streaming generation. Sends a `Chunk` event per fragment, then exactly one
/// `Final` or `Error` event, unless the receiver was dropped first.
pub async fn stream_floor_plan(
    request: GenerateRequest,
    prepared: PreparedRequest,
    model: Arc<dyn PlanModel>,
    settings: PlanSettings,
    events: mpsc::Sender<PlanEvent>,
) {
    let request_id = prepared.request_id;

    let event = match run_stream(request, prepared, model.as_ref(), &settings, &events).await {
        Ok(Some(response)) => PlanEvent::Final(Box::new(response)),
        Ok(None) => return,
        Err(e) => PlanEvent::from_error(&e),
    };

    if events.send(event).await.is_err() {
        debug!(%request_id, "Client went away before the final event");
    }
}

/// `Ok(None)` when the client disconnected mid-stream.
async fn run_stream(
    request: GenerateRequest,
    prepared: PreparedRequest,
    model: &dyn PlanModel,
    settings: &PlanSettings,
    events: &mpsc::Sender<PlanEvent>,
) -> Result<Option<FloorPlanResponse>, AppError> {
    let request_id = prepared.request_id;

    info!(%request_id, "Opening streaming floor plan request");
    let mut source = model
        .open_stream(FLOOR_PLAN_SYSTEM, &prepared.prompt)
        .await
        .inspect_err(|e| error!(%request_id, "Failed to open model stream: {e}"))?;

    let outcome = drain_stream(source.as_mut(), events)
        .await
        .inspect_err(|e| error!(%request_id, "Model stream failed: {e}"))?;

    if outcome.cancelled {
        let payload = extract_payload(&outcome.text);
        info!(
            %request_id,
            fragments = outcome.fragments,
            degraded = payload.is_degraded(),
            "Client disconnected, stream cancelled"
        );
        return Ok(None);
    }

    info!(%request_id, fragments = outcome.fragments, "Model stream complete");
    let floor_plan = plan_from_text(outcome.text, prepared.rect, settings)?;
    Ok(Some(FloorPlanResponse::new(request_id, request, floor_plan)))
}

// ────────────────────────────────────────────────────────────────────────────
// Test double
// ────────────────────────────────────────────────────────────────────────────

/// Model that replays canned output.
#[cfg(test)]
pub struct ScriptedModel {
    pub completion: Result<String, u16>,
    pub fragments: Vec<crate::llm_client::stream::StreamItem>,
}

#[cfg(test)]
impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        use crate::llm_client::stream::StreamItem;
        Self {
            completion: Ok(text.to_string()),
            fragments: vec![StreamItem::Fragment(text.to_string()), StreamItem::End],
        }
    }

    pub fn streaming(fragments: Vec<crate::llm_client::stream::StreamItem>) -> Self {
        Self {
            completion: Ok(String::new()),
            fragments,
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            completion: Err(status),
            fragments: Vec::new(),
        }
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl PlanModel for ScriptedModel {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
        match &self.completion {
            Ok(text) if text.is_empty() => Err(LlmError::EmptyContent),
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(LlmError::Api {
                status: *status,
                message: "scripted failure".to_string(),
            }),
        }
    }

    async fn open_stream(
        &self,
        _system: &str,
        _prompt: &str,
    ) -> Result<Box<dyn crate::llm_client::stream::FragmentSource>, LlmError> {
        if let Err(status) = self.completion {
            return Err(LlmError::Api {
                status,
                message: "scripted failure".to_string(),
            });
        }
        Ok(Box::new(crate::llm_client::stream::ScriptedFragments::new(
            self.fragments.clone(),
        )))
    }
}

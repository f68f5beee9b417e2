use std::sync::Arc;

use crate::llm_client::PlanModel;
use crate::partition::PlanSettings;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The language model. `LlmClient` in production, a scripted model in tests.
    pub model: Arc<dyn PlanModel>,
    pub plan_settings: PlanSettings,
}

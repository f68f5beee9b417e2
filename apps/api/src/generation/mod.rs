// Floor-plan generation: boundary summary, prompt construction, the model call
// and the extraction → validation → layout pipeline behind the HTTP handlers.
// All model calls go through llm_client; nothing here talks to OpenRouter directly.

pub mod boundary;
pub mod generator;
pub mod handlers;
pub mod prompts;

// Resume analysis pipeline
// Implements: upload, PDF-to-image conversion, AI review, feedback validation, persistence.
// All model calls go through llm_client's InferenceService; nothing here talks to Anthropic directly.

pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod registry;
pub mod repository;
pub mod sanitize;
pub mod score;
pub mod validate;
pub mod wipe;

//! Language-model translation layer for divvy negotiations.
//!
//! This crate turns a [`divvy_core::TurnContext`] into prompts and turns model
//! output back into structured turn signals:
//! - `llm` - the prompt-in/text-out seam and a scripted test double
//! - `http` - OpenAI-compatible chat-completion client
//! - `protocol` - delimiter parsing and halt-signal normalization
//! - `prompts` / `reflection` - prompt composition and belief-guided feedback
//! - `negotiator` - the [`divvy_core::TurnCollaborator`] implementation
//!
//! # Safety Principle
//!
//! The model is strictly a translator. It NEVER decides fairness, beliefs or
//! acceptance. Those are deterministic decisions made by divvy-core; the model
//! only phrases messages and restates the deal a message already contains.

pub mod http;
pub mod llm;
pub mod negotiator;
pub mod prompts;
pub mod protocol;
pub mod reflection;

pub use http::ChatCompletionClient;
pub use llm::{GenerationError, RecordedPrompt, ScriptedGenerator, TextGenerator};
pub use negotiator::{LlmNegotiator, NegotiatorSettings};

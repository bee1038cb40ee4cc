//! Autopilot Core — transport-agnostic domain logic for the inquiry-to-quote
//! autopilot.
//!
//! This crate holds the workflow model, the step orchestrator, the completion
//! client used by the orchestrator, the chat provider behind the completion
//! endpoint, and the rate limiter guarding it. It has **no HTTP framework
//! dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `autopilot-server`)
//! - CLI tools (via `autopilot-cli`)
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod error;
pub mod provider;
pub mod ratelimit;
pub mod state;
pub mod workflow;

// Convenience re-exports
pub use error::ServerError;
pub use provider::{ChatProvider, ChatRequest, OpenAiChatProvider, ProviderConfig, ProviderError};
pub use ratelimit::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimiter};
pub use state::{AppState, AppStateInner};
pub use workflow::{StepOrchestrator, WorkflowDefinition};

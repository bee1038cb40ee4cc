//! Workflow engine: declarative step DAGs with one branch point.
//!
//! # Architecture
//!
//! ```text
//! builtin / workflow.yaml ──► WorkflowDefinition ──► StepOrchestrator
//!                                                        │
//!                              PromptTemplate.render ◄───┤
//!                                                        │
//!                                  CompletionClient (POST /api/ai)
//!                                                        │
//!                              parse_decision ◄── decision step output
//! ```

pub mod builtin;
pub mod completion;
pub mod decision;
pub mod orchestrator;
pub mod schema;
pub mod template;

pub use builtin::{
    builtin_workflows, find_builtin, inquiry_to_quote, INQUIRY_TO_QUOTE_ID, SAMPLE_INQUIRY,
};
pub use completion::{
    CompletionClient, CompletionError, CompletionRequest, HttpCompletionClient, DEFAULT_TEMPERATURE,
};
pub use decision::{parse_decision, BranchDecision, DecisionError};
pub use orchestrator::{
    AggregateRunOutcome, DecisionFailure, Progress, RunOptions, StepOrchestrator, StepRunResult,
    StepRunState, StepSnapshot, StepStatus,
};
pub use schema::{
    BranchDefinition, DecisionConfig, StepDefinition, WorkflowDefinition, WorkflowError,
};
pub use template::{PromptContext, PromptTemplate};

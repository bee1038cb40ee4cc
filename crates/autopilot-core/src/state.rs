//! Shared application state for the HTTP adapter.

use std::sync::Arc;

use crate::provider::ChatProvider;
use crate::ratelimit::RateLimiter;
use crate::workflow::{builtin_workflows, WorkflowDefinition};

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub provider: Arc<dyn ChatProvider>,
    pub rate_limiter: RateLimiter,
    /// Built-in workflows followed by any loaded from YAML.
    pub workflows: Vec<WorkflowDefinition>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(provider: Arc<dyn ChatProvider>, rate_limiter: RateLimiter) -> Self {
        Self {
            provider,
            rate_limiter,
            workflows: builtin_workflows(),
        }
    }

    /// Add workflows; one with an existing id replaces it.
    pub fn with_workflows(mut self, workflows: Vec<WorkflowDefinition>) -> Self {
        for workflow in workflows {
            match self.workflows.iter_mut().find(|w| w.id == workflow.id) {
                Some(existing) => *existing = workflow,
                None => self.workflows.push(workflow),
            }
        }
        self
    }

    pub fn workflow(&self, id: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|w| w.id == id)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::provider::{ChatRequest, ProviderError};
    use crate::ratelimit::RateLimitConfig;
    use crate::workflow::INQUIRY_TO_QUOTE_ID;

    struct NoopProvider;

    #[async_trait]
    impl ChatProvider for NoopProvider {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
            Ok(String::new())
        }
    }

    fn state() -> AppStateInner {
        AppStateInner::new(
            Arc::new(NoopProvider),
            RateLimiter::disabled(RateLimitConfig::default()),
        )
    }

    #[test]
    fn test_builtins_are_registered() {
        assert!(state().workflow(INQUIRY_TO_QUOTE_ID).is_some());
        assert!(state().workflow("missing").is_none());
    }

    #[test]
    fn test_loaded_workflow_replaces_same_id() {
        let mut custom = crate::workflow::inquiry_to_quote();
        custom.name = "Custom".to_string();
        let mut other = crate::workflow::inquiry_to_quote();
        other.id = "other".to_string();

        let state = state().with_workflows(vec![custom, other]);
        assert_eq!(state.workflows.len(), 2);
        assert_eq!(state.workflow(INQUIRY_TO_QUOTE_ID).map(|w| w.name.as_str()), Some("Custom"));
    }
}

//! End-to-end runs of the built-in inquiry-to-quote workflow against a
//! canned completion client.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use autopilot_core::workflow::{
    inquiry_to_quote, AggregateRunOutcome, CompletionClient, CompletionError, CompletionRequest,
    RunOptions, StepOrchestrator, StepStatus,
};

/// Answers the guardrails step with `decision`, every other step with a
/// small JSON blob.
struct CannedClient {
    decision: String,
    prompts: Mutex<Vec<String>>,
}

impl CannedClient {
    fn new(decision: &str) -> Arc<Self> {
        Arc::new(Self {
            decision: decision.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionClient for CannedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let system = request.system.as_deref().unwrap_or_default();
        if system.contains("enforce guardrails") {
            Ok(self.decision.clone())
        } else {
            Ok(r#"{"ok":true}"#.to_string())
        }
    }
}

#[tokio::test]
async fn test_quote_now_runs_compose_quote() {
    let client = CannedClient::new(r#"{"pathEcho":"quote_now","cta":"book_now"}"#);
    let mut orch = StepOrchestrator::new(inquiry_to_quote(), client.clone())
        .with_customer_message("Pressure wash my 2 car driveway next week");

    let outcome = orch.run_all_eligible().await;
    assert_eq!(
        outcome,
        AggregateRunOutcome::Completed {
            branch: "quote_now".to_string(),
            step_id: "compose-quote".to_string(),
        }
    );
    assert_eq!(orch.status("compose-photo-request"), StepStatus::Idle);
    assert_eq!(orch.status("compose-human-summary"), StepStatus::Idle);

    let prompts = client.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 6);
    assert!(prompts[0].contains("Pressure wash my 2 car driveway next week"));
    assert!(prompts[4].contains("22"));
}

#[tokio::test]
async fn test_step_by_step_matches_decision() {
    let client = CannedClient::new(r#"{"path":"need_photos"}"#);
    let mut orch = StepOrchestrator::new(inquiry_to_quote(), client);

    while let Some(next) = orch.next_step().map(str::to_string) {
        let result = orch.run_step(&next, RunOptions::guarded()).await;
        assert!(result.success, "step {} failed", next);
    }

    assert_eq!(orch.selected_branch().as_deref(), Some("need_photos"));
    assert_eq!(orch.status("compose-photo-request"), StepStatus::Done);
    assert_eq!(orch.status("compose-quote"), StepStatus::Idle);
    assert_eq!(
        orch.locked_reason("compose-quote").as_deref(),
        Some("Current path: Request photos.")
    );
    let progress = orch.progress();
    assert_eq!((progress.completed, progress.total), (5, 5));
}

#[tokio::test]
async fn test_unusable_decision_leaves_branches_idle() {
    let client = CannedClient::new("Quote them now, obviously.");
    let mut orch = StepOrchestrator::new(inquiry_to_quote(), client);

    let outcome = orch.run_all_eligible().await;
    assert!(matches!(outcome, AggregateRunOutcome::Undecided(_)));
    for (id, _) in orch.workflow().branch_steps() {
        assert_eq!(orch.status(id), StepStatus::Idle);
    }
    assert_eq!(orch.status("guardrails-present"), StepStatus::Done);
}

//! Step Orchestrator — per-session run state for one workflow.
//!
//! The orchestrator:
//! 1. Tracks `idle / running / done / error` plus output and error per step
//! 2. Gates steps on their dependencies and on the branch decision
//! 3. Runs one step at a time through a [`CompletionClient`]
//! 4. Runs every base step in order, then the single branch step the
//!    decision step selected
//!
//! All mutation goes through `&mut self`, so a session is driven by exactly
//! one caller and steps never overlap.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::completion::{CompletionClient, CompletionRequest};
use super::decision::{parse_decision, BranchDecision, DecisionError};
use super::schema::WorkflowDefinition;
use super::template::PromptContext;

const PREREQUISITES_MESSAGE: &str = "Complete prerequisite steps first.";
const OTHER_BRANCH_MESSAGE: &str = "This step is gated by a different branch.";

/// Run status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

impl StepStatus {
    /// Short label shown next to the step.
    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Idle => "Ready",
            StepStatus::Running => "Running",
            StepStatus::Done => "Complete",
            StepStatus::Error => "Needs attention",
        }
    }
}

/// Status, output and error of one step within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepRunState {
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Options for [`StepOrchestrator::run_step`].
#[derive(Debug, Default)]
pub struct RunOptions<'a> {
    /// Skip dependency and branch gating. A step that is already running or
    /// done is still never re-run.
    pub bypass_guards: bool,
    /// Read the previous step output from here instead of session state, and
    /// record this step's output into it on success.
    pub existing_outputs: Option<&'a mut HashMap<String, String>>,
}

impl RunOptions<'_> {
    pub fn guarded() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRunResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl StepRunResult {
    fn failed() -> Self {
        Self {
            success: false,
            output: None,
        }
    }
}

/// Why an aggregate run did not reach a branch step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionFailure {
    #[error(transparent)]
    Unparseable(#[from] DecisionError),

    #[error("Decision selected unknown branch '{0}'")]
    UnknownBranch(String),
}

/// How [`StepOrchestrator::run_all_eligible`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateRunOutcome {
    /// All base steps and the selected branch step are done.
    Completed { branch: String, step_id: String },
    /// A step failed; nothing after it ran.
    Stopped { step_id: String },
    /// Base steps are done but no branch step ran. Step state carries no
    /// error for this case.
    Undecided(DecisionFailure),
}

impl AggregateRunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, AggregateRunOutcome::Completed { .. })
    }
}

/// Completed vs total base (non-branch) steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Serializable view of one step, in workflow order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_path: Option<String>,
    #[serde(flatten)]
    pub state: StepRunState,
    pub can_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_reason: Option<String>,
}

/// In-memory orchestration session for one workflow.
pub struct StepOrchestrator {
    session_id: String,
    workflow: WorkflowDefinition,
    client: Arc<dyn CompletionClient>,
    customer_message: String,
    temperature: Option<f64>,
    states: HashMap<String, StepRunState>,
}

impl StepOrchestrator {
    pub fn new(workflow: WorkflowDefinition, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            workflow,
            client,
            customer_message: String::new(),
            temperature: None,
            states: HashMap::new(),
        }
    }

    pub fn with_customer_message(mut self, message: impl Into<String>) -> Self {
        self.customer_message = message.into();
        self
    }

    /// Temperature sent with every request; unset leaves the endpoint default.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workflow(&self) -> &WorkflowDefinition {
        &self.workflow
    }

    pub fn customer_message(&self) -> &str {
        &self.customer_message
    }

    /// Edit the inquiry. Existing step results are kept until `reset`.
    pub fn set_customer_message(&mut self, message: impl Into<String>) {
        self.customer_message = message.into();
    }

    // ─── Read side ────────────────────────────────────────────────────────

    pub fn state(&self, step_id: &str) -> StepRunState {
        self.states.get(step_id).cloned().unwrap_or_default()
    }

    pub fn status(&self, step_id: &str) -> StepStatus {
        self.states
            .get(step_id)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    pub fn output(&self, step_id: &str) -> Option<&str> {
        self.states.get(step_id).and_then(|s| s.output.as_deref())
    }

    pub fn error(&self, step_id: &str) -> Option<&str> {
        self.states.get(step_id).and_then(|s| s.error.as_deref())
    }

    /// Parse result of the decision step's output, `None` before it has any.
    pub fn decision(&self) -> Option<Result<BranchDecision, DecisionError>> {
        self.output(self.workflow.decision_step_id())
            .map(|output| parse_decision(output, &self.workflow.decision.fields))
    }

    /// The branch chosen by the decision step, if it names a known branch.
    pub fn selected_branch(&self) -> Option<String> {
        self.decision()
            .and_then(Result::ok)
            .map(|d| d.branch)
            .filter(|branch| self.workflow.branches.contains_key(branch))
    }

    /// Whether `step_id` may run right now.
    pub fn can_run(&self, step_id: &str) -> bool {
        let Some(step) = self.workflow.step(step_id) else {
            return false;
        };

        if matches!(self.status(step_id), StepStatus::Done | StepStatus::Running) {
            return false;
        }

        if let Some(ref required) = step.required_path {
            if self.status(self.workflow.decision_step_id()) != StepStatus::Done {
                return false;
            }
            if self.selected_branch().as_deref() != Some(required.as_str()) {
                return false;
            }
        }

        step.depends_on
            .iter()
            .all(|dep| self.status(dep) == StepStatus::Done)
    }

    /// Human-readable reason a step is locked, `None` when it can run or
    /// is already running/done.
    pub fn locked_reason(&self, step_id: &str) -> Option<String> {
        let step = self.workflow.step(step_id)?;
        if matches!(self.status(step_id), StepStatus::Done | StepStatus::Running) {
            return None;
        }

        if let Some(ref required) = step.required_path {
            let decision_id = self.workflow.decision_step_id();
            if self.status(decision_id) != StepStatus::Done {
                let title = self
                    .workflow
                    .step(decision_id)
                    .map(|s| s.title.as_str())
                    .unwrap_or(decision_id);
                return Some(format!("Complete {} to unlock branch automations.", title));
            }
            match self.selected_branch() {
                None => return Some("Waiting for a branch decision.".to_string()),
                Some(branch) if &branch != required => {
                    let label = self
                        .workflow
                        .branches
                        .get(&branch)
                        .map(|b| b.label.as_str())
                        .unwrap_or(branch.as_str());
                    return Some(format!("Current path: {}.", label));
                }
                Some(_) => {}
            }
        }

        step.depends_on
            .iter()
            .find(|dep| self.status(dep) != StepStatus::Done)
            .map(|dep| match self.workflow.step(dep) {
                Some(dep_step) => format!("Complete {} first.", dep_step.title),
                None => "Complete prerequisite step first.".to_string(),
            })
    }

    /// First runnable step in declared order.
    pub fn next_step(&self) -> Option<&str> {
        self.workflow
            .step_order
            .iter()
            .map(String::as_str)
            .find(|id| self.can_run(id))
    }

    pub fn progress(&self) -> Progress {
        let mut progress = Progress {
            completed: 0,
            total: 0,
        };
        for (id, _) in self.workflow.base_steps() {
            progress.total += 1;
            if self.status(id) == StepStatus::Done {
                progress.completed += 1;
            }
        }
        progress
    }

    pub fn snapshot(&self) -> Vec<StepSnapshot> {
        self.workflow
            .ordered_steps()
            .map(|(id, step)| StepSnapshot {
                id: id.to_string(),
                title: step.title.clone(),
                stage: step.stage.clone(),
                required_path: step.required_path.clone(),
                state: self.state(id),
                can_run: self.can_run(id),
                locked_reason: self.locked_reason(id),
            })
            .collect()
    }

    // ─── Write side ───────────────────────────────────────────────────────

    /// Clear status, output and error of every step.
    pub fn reset(&mut self) {
        self.states.clear();
        tracing::debug!("[Orchestrator:{}] Run state reset", self.session_id);
    }

    /// Run a single step.
    ///
    /// Never re-runs a step that is running or done. Guard violations are
    /// recorded as the step's error without contacting the client.
    pub async fn run_step(&mut self, step_id: &str, options: RunOptions<'_>) -> StepRunResult {
        let RunOptions {
            bypass_guards,
            existing_outputs,
        } = options;

        let Some(step) = self.workflow.step(step_id).cloned() else {
            tracing::warn!("[Orchestrator:{}] Unknown step '{}'", self.session_id, step_id);
            return StepRunResult::failed();
        };

        if matches!(self.status(step_id), StepStatus::Running | StepStatus::Done) {
            return StepRunResult::failed();
        }

        if !bypass_guards && !self.can_run(step_id) {
            let message = match (&step.required_path, self.selected_branch()) {
                (Some(required), Some(selected)) if &selected != required => OTHER_BRANCH_MESSAGE,
                _ => PREREQUISITES_MESSAGE,
            };
            self.states.entry(step_id.to_string()).or_default().error = Some(message.to_string());
            return StepRunResult::failed();
        }

        {
            let state = self.states.entry(step_id.to_string()).or_default();
            state.status = StepStatus::Running;
            state.error = None;
        }

        let previous_step_output = step.templating_predecessor().and_then(|dep| {
            match existing_outputs.as_deref() {
                Some(outputs) => outputs.get(dep).cloned(),
                None => self.output(dep).map(str::to_string),
            }
        });

        let prompt = step.prompt.render(
            &PromptContext {
                customer_message: &self.customer_message,
                previous_step_output: previous_step_output.as_deref(),
            },
            &self.workflow.variables,
        );

        let mut request = CompletionRequest::new(step.system.clone(), prompt);
        request.temperature = self.temperature;

        tracing::info!(
            "[Orchestrator:{}] Running step '{}' ({})",
            self.session_id,
            step_id,
            step.title
        );

        let result = self.client.complete(&request).await;
        let state = self.states.entry(step_id.to_string()).or_default();
        match result {
            Ok(output) => {
                state.status = StepStatus::Done;
                state.output = Some(output.clone());
                if let Some(outputs) = existing_outputs {
                    outputs.insert(step_id.to_string(), output.clone());
                }
                tracing::info!("[Orchestrator:{}] Step '{}' done", self.session_id, step_id);
                StepRunResult {
                    success: true,
                    output: Some(output),
                }
            }
            Err(e) => {
                tracing::warn!(
                    "[Orchestrator:{}] Step '{}' failed: {}",
                    self.session_id,
                    step_id,
                    e
                );
                state.status = StepStatus::Error;
                state.error = Some(e.to_string());
                StepRunResult::failed()
            }
        }
    }

    /// Reset, run every base step in order, then the one branch step the
    /// decision selected.
    pub async fn run_all_eligible(&mut self) -> AggregateRunOutcome {
        self.reset();

        let mut outputs: HashMap<String, String> = HashMap::new();
        let base_steps: Vec<String> = self
            .workflow
            .base_steps()
            .map(|(id, _)| id.to_string())
            .collect();

        for step_id in base_steps {
            let result = self
                .run_step(
                    &step_id,
                    RunOptions {
                        bypass_guards: true,
                        existing_outputs: Some(&mut outputs),
                    },
                )
                .await;
            if !result.success {
                return AggregateRunOutcome::Stopped { step_id };
            }
        }

        let decision_output = outputs
            .get(self.workflow.decision_step_id())
            .map(String::as_str)
            .unwrap_or_default();

        let decision = match parse_decision(decision_output, &self.workflow.decision.fields) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    "[Orchestrator:{}] No branch selected, decision output unusable: {}",
                    self.session_id,
                    e
                );
                return AggregateRunOutcome::Undecided(e.into());
            }
        };

        let Some(branch) = self.workflow.branches.get(&decision.branch) else {
            tracing::warn!(
                "[Orchestrator:{}] Decision selected unknown branch '{}'",
                self.session_id,
                decision.branch
            );
            return AggregateRunOutcome::Undecided(DecisionFailure::UnknownBranch(decision.branch));
        };
        let step_id = branch.result_step_id.clone();

        let result = self
            .run_step(
                &step_id,
                RunOptions {
                    bypass_guards: true,
                    existing_outputs: Some(&mut outputs),
                },
            )
            .await;

        if result.success {
            AggregateRunOutcome::Completed {
                branch: decision.branch,
                step_id,
            }
        } else {
            AggregateRunOutcome::Stopped { step_id }
        }
    }
}

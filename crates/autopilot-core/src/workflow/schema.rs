//! Schema types for workflow definitions.
//!
//! A workflow is a small DAG of LLM steps with a single branch point. It can
//! be built in code (see [`crate::workflow::builtin`]) or loaded from YAML:
//!
//! ```yaml
//! id: "lead-triage"
//! name: "Lead Triage"
//! entryStepId: "extract"
//! decision:
//!   stepId: "route"
//!   fields: ["pathEcho", "path"]
//! stepOrder: ["extract", "route", "reply", "escalate"]
//! variables:
//!   tone: "friendly"
//! steps:
//!   extract:
//!     title: "Extract"
//!     system: "Output strict JSON only."
//!     prompt: "Inquiry:\n${customer_message}"
//!   route:
//!     title: "Route"
//!     prompt: "Features:\n${previous_step_output}"
//!     dependsOn: ["extract"]
//!   reply:
//!     title: "Reply"
//!     prompt: "Write a ${tone} reply to: ${customer_message}"
//!     dependsOn: ["route"]
//!     requiredPath: "auto_reply"
//!   escalate:
//!     title: "Escalate"
//!     prompt: "Summarize for a human: ${previous_step_output}"
//!     dependsOn: ["route"]
//!     requiredPath: "needs_human"
//! branches:
//!   auto_reply: { label: "Auto reply", resultStepId: "reply" }
//!   needs_human: { label: "Human review", resultStepId: "escalate" }
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::template::PromptTemplate;

/// Field names read from the decision step's JSON output, highest priority first.
pub const DEFAULT_DECISION_FIELDS: [&str; 2] = ["pathEcho", "path"];

/// Top-level workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Stable identifier used in URLs and CLI arguments
    pub id: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// First step of the workflow (no dependencies, no required path)
    pub entry_step_id: String,

    /// The single branch point
    pub decision: DecisionConfig,

    /// Topological order of every step
    pub step_order: Vec<String>,

    pub steps: HashMap<String, StepDefinition>,

    /// Branch key → step that runs when the decision selects it
    #[serde(default)]
    pub branches: HashMap<String, BranchDefinition>,

    /// Values available to prompt templates as `${key}`
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Which step decides the branch, and how its output is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionConfig {
    pub step_id: String,

    /// JSON field names holding the branch key; earlier entries win.
    #[serde(default = "default_decision_fields")]
    pub fields: Vec<String>,
}

impl DecisionConfig {
    pub fn new(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            fields: default_decision_fields(),
        }
    }
}

fn default_decision_fields() -> Vec<String> {
    DEFAULT_DECISION_FIELDS.iter().map(|f| f.to_string()).collect()
}

/// A single step of the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// System prompt sent alongside the rendered user prompt
    #[serde(default)]
    pub system: Option<String>,

    /// User prompt template
    pub prompt: PromptTemplate,

    /// Steps that must be `done` first. The last entry feeds
    /// `${previous_step_output}`.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Branch key this step is gated on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_path: Option<String>,

    /// Timeline lane label, e.g. "Pricing"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,

    /// Guardrail bullets shown next to the step's output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guardrails: Vec<String>,
}

impl StepDefinition {
    /// Dependency whose output is passed to the prompt template.
    pub fn templating_predecessor(&self) -> Option<&str> {
        self.depends_on.last().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDefinition {
    pub label: String,
    pub result_step_id: String,
}

/// Errors raised while loading or validating a workflow definition.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Failed to read workflow file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse workflow YAML: {0}")]
    Parse(String),

    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{step}' requires unknown branch '{branch}'")]
    UnknownBranch { step: String, branch: String },

    #[error("Branch '{branch}' points at unknown step '{step}'")]
    UnknownBranchTarget { branch: String, step: String },

    #[error("Branch '{branch}' targets step '{step}', which is not gated on it")]
    BranchTargetNotGated { branch: String, step: String },

    #[error("Step order is invalid: {0}")]
    InvalidStepOrder(String),

    #[error("Entry step '{0}' must have no dependencies and no required path")]
    InvalidEntryStep(String),

    #[error("Decision step '{0}' must not be gated on a branch")]
    InvalidDecisionStep(String),

    #[error("Decision config must name at least one branch field")]
    NoDecisionFields,
}

impl WorkflowDefinition {
    /// Parse a workflow definition from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        let workflow: Self =
            serde_yaml::from_str(yaml).map_err(|e| WorkflowError::Parse(e.to_string()))?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: &str) -> Result<Self, WorkflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| WorkflowError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    pub fn step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.get(step_id)
    }

    /// Steps in declared order, paired with their ids.
    pub fn ordered_steps(&self) -> impl Iterator<Item = (&str, &StepDefinition)> {
        self.step_order
            .iter()
            .filter_map(|id| self.steps.get(id).map(|step| (id.as_str(), step)))
    }

    /// Steps not gated on a branch, in declared order.
    pub fn base_steps(&self) -> impl Iterator<Item = (&str, &StepDefinition)> {
        self.ordered_steps()
            .filter(|(_, step)| step.required_path.is_none())
    }

    /// Branch-gated steps, in declared order.
    pub fn branch_steps(&self) -> impl Iterator<Item = (&str, &StepDefinition)> {
        self.ordered_steps()
            .filter(|(_, step)| step.required_path.is_some())
    }

    pub fn decision_step_id(&self) -> &str {
        &self.decision.step_id
    }

    /// Check the structural invariants of the graph.
    ///
    /// `step_order` must list every step exactly once with each dependency
    /// placed before its dependents, which also rules out cycles.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.decision.fields.is_empty() {
            return Err(WorkflowError::NoDecisionFields);
        }

        let entry = self
            .steps
            .get(&self.entry_step_id)
            .ok_or_else(|| WorkflowError::UnknownStep(self.entry_step_id.clone()))?;
        if !entry.depends_on.is_empty() || entry.required_path.is_some() {
            return Err(WorkflowError::InvalidEntryStep(self.entry_step_id.clone()));
        }

        let decision = self
            .steps
            .get(&self.decision.step_id)
            .ok_or_else(|| WorkflowError::UnknownStep(self.decision.step_id.clone()))?;
        if decision.required_path.is_some() {
            return Err(WorkflowError::InvalidDecisionStep(self.decision.step_id.clone()));
        }

        for (id, step) in &self.steps {
            for dep in &step.depends_on {
                if !self.steps.contains_key(dep) {
                    return Err(WorkflowError::UnknownDependency {
                        step: id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            if let Some(ref branch) = step.required_path {
                if !self.branches.contains_key(branch) {
                    return Err(WorkflowError::UnknownBranch {
                        step: id.clone(),
                        branch: branch.clone(),
                    });
                }
            }
        }

        for (key, branch) in &self.branches {
            let target = self.steps.get(&branch.result_step_id).ok_or_else(|| {
                WorkflowError::UnknownBranchTarget {
                    branch: key.clone(),
                    step: branch.result_step_id.clone(),
                }
            })?;
            if target.required_path.as_deref() != Some(key.as_str()) {
                return Err(WorkflowError::BranchTargetNotGated {
                    branch: key.clone(),
                    step: branch.result_step_id.clone(),
                });
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for id in &self.step_order {
            let step = self
                .steps
                .get(id)
                .ok_or_else(|| WorkflowError::InvalidStepOrder(format!("unknown step '{}'", id)))?;
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(WorkflowError::InvalidStepOrder(format!(
                        "'{}' is listed before its dependency '{}'",
                        id, dep
                    )));
                }
            }
            if !seen.insert(id.as_str()) {
                return Err(WorkflowError::InvalidStepOrder(format!(
                    "'{}' is listed twice",
                    id
                )));
            }
        }
        if seen.len() != self.steps.len() {
            let mut missing: Vec<_> = self
                .steps
                .keys()
                .filter(|id| !seen.contains(id.as_str()))
                .cloned()
                .collect();
            missing.sort();
            return Err(WorkflowError::InvalidStepOrder(format!(
                "missing steps: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIAGE_YAML: &str = r#"
id: "lead-triage"
name: "Lead Triage"
entryStepId: "extract"
decision:
  stepId: "route"
stepOrder: ["extract", "route", "reply", "escalate"]
variables:
  tone: "friendly"
steps:
  extract:
    title: "Extract"
    system: "Output strict JSON only."
    prompt: "Inquiry:\n${customer_message}"
  route:
    title: "Route"
    prompt: "Features:\n${previous_step_output}"
    dependsOn: ["extract"]
  reply:
    title: "Reply"
    prompt: "Write a ${tone} reply"
    dependsOn: ["route"]
    requiredPath: "auto_reply"
  escalate:
    title: "Escalate"
    prompt: "Summarize: ${previous_step_output}"
    dependsOn: ["route"]
    requiredPath: "needs_human"
branches:
  auto_reply: { label: "Auto reply", resultStepId: "reply" }
  needs_human: { label: "Human review", resultStepId: "escalate" }
"#;

    #[test]
    fn test_parse_workflow_yaml() {
        let wf = WorkflowDefinition::from_yaml(TRIAGE_YAML).unwrap();
        assert_eq!(wf.id, "lead-triage");
        assert_eq!(wf.steps.len(), 4);
        assert_eq!(wf.decision.fields, vec!["pathEcho", "path"]);
        assert_eq!(wf.variables.get("tone").unwrap(), "friendly");
        assert_eq!(wf.step("route").unwrap().templating_predecessor(), Some("extract"));

        let base: Vec<_> = wf.base_steps().map(|(id, _)| id).collect();
        assert_eq!(base, vec!["extract", "route"]);
        let branch: Vec<_> = wf.branch_steps().map(|(id, _)| id).collect();
        assert_eq!(branch, vec!["reply", "escalate"]);
    }

    #[test]
    fn test_rejects_unknown_dependency() {
        let yaml = TRIAGE_YAML.replace(r#"dependsOn: ["extract"]"#, r#"dependsOn: ["ghost"]"#);
        let err = WorkflowDefinition::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownDependency { .. }));
    }

    #[test]
    fn test_rejects_unknown_branch() {
        let yaml = TRIAGE_YAML.replace(r#"requiredPath: "auto_reply""#, r#"requiredPath: "nope""#);
        let err = WorkflowDefinition::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownBranch { .. }));
    }

    #[test]
    fn test_rejects_out_of_order_steps() {
        let yaml = TRIAGE_YAML.replace(
            r#"stepOrder: ["extract", "route", "reply", "escalate"]"#,
            r#"stepOrder: ["route", "extract", "reply", "escalate"]"#,
        );
        let err = WorkflowDefinition::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidStepOrder(_)));
    }

    #[test]
    fn test_rejects_cycle() {
        // route ↔ reply can never be ordered
        let yaml = TRIAGE_YAML.replace(
            r#"dependsOn: ["extract"]"#,
            r#"dependsOn: ["extract", "reply"]"#,
        );
        let err = WorkflowDefinition::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidStepOrder(_)));
    }

    #[test]
    fn test_rejects_missing_step_in_order() {
        let yaml = TRIAGE_YAML.replace(
            r#"stepOrder: ["extract", "route", "reply", "escalate"]"#,
            r#"stepOrder: ["extract", "route", "reply"]"#,
        );
        let err = WorkflowDefinition::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("missing steps: escalate"));
    }

    #[test]
    fn test_from_file_reports_path() {
        let err = WorkflowDefinition::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn test_from_file_round_trips_definition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.yaml");
        std::fs::write(&path, TRIAGE_YAML).unwrap();

        let wf = WorkflowDefinition::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(wf.name, "Lead Triage");

        // The serialized form (served to the UI) loads back unchanged.
        let yaml = serde_yaml::to_string(&wf).unwrap();
        let reloaded = WorkflowDefinition::from_yaml(&yaml).unwrap();
        assert_eq!(reloaded.step_order, wf.step_order);
        assert_eq!(reloaded.branches.len(), 2);
    }
}

//! `autopilot workflow` — Inspect and run step workflows.

use std::sync::Arc;

use autopilot_core::workflow::{
    builtin_workflows, AggregateRunOutcome, CompletionClient, HttpCompletionClient, RunOptions,
    StepOrchestrator, StepStatus, WorkflowDefinition, SAMPLE_INQUIRY,
};

use super::{print_json, resolve_workflow};

/// Arguments of `autopilot workflow run`.
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Built-in workflow id or YAML file path
    pub workflow: String,
    /// Full URL of the completion endpoint
    pub endpoint: String,
    /// Customer inquiry; the sample inquiry when unset
    pub message: Option<String>,
    pub temperature: Option<f64>,
    /// Run only these steps, in order, honoring guards
    pub steps: Vec<String>,
    /// Print the final snapshot as JSON instead of text
    pub json: bool,
}

/// Run a workflow against a remote completion endpoint.
pub async fn run(args: RunArgs) -> Result<(), String> {
    let workflow = resolve_workflow(&args.workflow)?;
    let client = Arc::new(HttpCompletionClient::new(args.endpoint.clone()));

    if !args.json {
        println!("📄 Workflow: {} ({})", workflow.name, workflow.id);
        println!("   Endpoint: {}", args.endpoint);
        println!();
    }

    let orch = execute(workflow, client, &args).await?;

    if args.json {
        print_json(&serde_json::json!({
            "sessionId": orch.session_id(),
            "selectedBranch": orch.selected_branch(),
            "progress": orch.progress(),
            "steps": orch.snapshot(),
        }));
    }

    Ok(())
}

/// Drive an orchestrator for `args` with any completion client.
///
/// Returns the orchestrator so callers can inspect the final state. A failed
/// step (or failed guard when `steps` is given) is an error.
pub async fn execute(
    workflow: WorkflowDefinition,
    client: Arc<dyn CompletionClient>,
    args: &RunArgs,
) -> Result<StepOrchestrator, String> {
    let message = args
        .message
        .clone()
        .unwrap_or_else(|| SAMPLE_INQUIRY.to_string());
    let mut orch = StepOrchestrator::new(workflow, client).with_customer_message(message);
    if let Some(temperature) = args.temperature {
        orch = orch.with_temperature(temperature);
    }

    if args.steps.is_empty() {
        let outcome = orch.run_all_eligible().await;
        if !args.json {
            print_steps(&orch);
        }
        return match outcome {
            AggregateRunOutcome::Completed { branch, step_id } => {
                if !args.json {
                    println!("\n🎉 Path '{}' completed with '{}'", branch, step_id);
                }
                Ok(orch)
            }
            AggregateRunOutcome::Undecided(reason) => {
                if !args.json {
                    println!("\n⚠️  No branch selected: {}", reason);
                }
                Ok(orch)
            }
            AggregateRunOutcome::Stopped { step_id } => Err(format!(
                "Step '{}' failed: {}",
                step_id,
                orch.error(&step_id).unwrap_or("unknown error")
            )),
        };
    }

    for step_id in &args.steps {
        if orch.workflow().step(step_id).is_none() {
            return Err(format!("Unknown step '{}'", step_id));
        }
        let result = orch.run_step(step_id, RunOptions::guarded()).await;
        if !result.success {
            if !args.json {
                print_steps(&orch);
            }
            return Err(format!(
                "Step '{}' did not run: {}",
                step_id,
                orch.error(step_id).unwrap_or("already complete")
            ));
        }
    }
    if !args.json {
        print_steps(&orch);
    }
    Ok(orch)
}

fn print_steps(orch: &StepOrchestrator) {
    for snapshot in orch.snapshot() {
        let icon = match snapshot.state.status {
            StepStatus::Done => "✅",
            StepStatus::Error => "❌",
            StepStatus::Running => "⏳",
            StepStatus::Idle => "·",
        };
        println!(
            "{} {} [{}]",
            icon,
            snapshot.title,
            snapshot.state.status.label()
        );
        if let Some(ref output) = snapshot.state.output {
            for line in output.lines() {
                println!("     {}", line);
            }
        }
        if let Some(ref error) = snapshot.state.error {
            println!("     error: {}", error);
        } else if let Some(ref reason) = snapshot.locked_reason {
            println!("     {}", reason);
        }
    }

    let progress = orch.progress();
    println!(
        "\n{}/{} base steps complete",
        progress.completed, progress.total
    );
}

/// List built-in workflows.
pub fn list() -> Result<(), String> {
    for workflow in builtin_workflows() {
        println!(
            "{:<20} {} ({} steps)",
            workflow.id,
            workflow.name,
            workflow.steps.len()
        );
    }
    Ok(())
}

/// Print a workflow's steps and branches.
pub fn show(id_or_path: &str, json: bool) -> Result<(), String> {
    let workflow = resolve_workflow(id_or_path)?;

    if json {
        let value = serde_json::to_value(&workflow)
            .map_err(|e| format!("Failed to serialize workflow: {}", e))?;
        print_json(&value);
        return Ok(());
    }

    println!("{} ({})", workflow.name, workflow.id);
    if let Some(ref description) = workflow.description {
        println!("   {}", description);
    }
    println!();

    for (i, (id, step)) in workflow.ordered_steps().enumerate() {
        let marker = if id == workflow.decision_step_id() {
            " ◆ decision"
        } else {
            ""
        };
        println!(
            "   {}. {} [{}]{}",
            i + 1,
            step.title,
            step.stage.as_deref().unwrap_or(id),
            marker
        );
        if !step.depends_on.is_empty() {
            println!("      after: {}", step.depends_on.join(", "));
        }
        if let Some(ref path) = step.required_path {
            println!("      only on path: {}", path);
        }
    }

    let mut branches: Vec<_> = workflow.branches.iter().collect();
    branches.sort_by(|a, b| a.0.cmp(b.0));
    println!();
    println!("   Branches (read from {}):", workflow.decision.fields.join(" / "));
    for (key, branch) in branches {
        println!("   - {} → {} ({})", key, branch.result_step_id, branch.label);
    }

    Ok(())
}

/// Validate a workflow YAML file without executing it.
pub fn validate(workflow_file: &str) -> Result<(), String> {
    let workflow = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;

    println!("✅ Workflow '{}' is valid", workflow.name);
    println!("   Steps: {}", workflow.steps.len());
    println!("   Branches: {}", workflow.branches.len());
    println!("   Decision step: {}", workflow.decision_step_id());

    Ok(())
}

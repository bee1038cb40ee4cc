//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! autopilot-core domain logic (and the autopilot-server bootstrap).

pub mod server;
pub mod workflow;

use autopilot_core::workflow::{find_builtin, WorkflowDefinition};

/// Load `.env.local` then `.env` from the working directory.
///
/// Variables already present in the environment are never overridden, so
/// `.env.local` wins over `.env`.
pub fn load_dotenv() {
    for filename in [".env.local", ".env"] {
        match dotenvy::from_filename(filename) {
            Ok(path) => tracing::debug!("[CLI] Loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => eprintln!("Warning: failed to load {}: {}", filename, e),
        }
    }
}

/// Resolve a workflow by built-in id, falling back to a YAML file path.
pub fn resolve_workflow(id_or_path: &str) -> Result<WorkflowDefinition, String> {
    if let Some(workflow) = find_builtin(id_or_path) {
        return Ok(workflow);
    }
    if std::path::Path::new(id_or_path).is_file() {
        return WorkflowDefinition::from_file(id_or_path).map_err(|e| e.to_string());
    }
    Err(format!(
        "Unknown workflow '{}': not a built-in id or a readable file",
        id_or_path
    ))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

//! Branch decision parsing.
//!
//! The decision step's LLM output is expected to be a JSON object naming the
//! chosen branch under one of the configured fields (by default `pathEcho`,
//! then `path`). Nothing upstream enforces that shape, so every read goes
//! through [`parse_decision`] and its failure modes are explicit.

use serde::Serialize;

/// A successfully parsed branch selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDecision {
    /// Selected branch key (not yet checked against the workflow's branches)
    pub branch: String,
    /// Field the key was read from
    pub field: String,
    /// The full decision object, for presentation (cta, hidden tiers, ...)
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("Decision output is empty")]
    Empty,

    #[error("Decision output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Decision output is not a JSON object")]
    NotAnObject,

    #[error("Decision output has none of the fields {0:?}")]
    MissingField(Vec<String>),

    #[error("Decision field '{0}' is not a non-empty string")]
    InvalidField(String),
}

/// Parse the decision step's raw output.
///
/// The first field in `fields` that is present and not `null` wins; a later
/// field is never consulted once an earlier one is present.
pub fn parse_decision(output: &str, fields: &[String]) -> Result<BranchDecision, DecisionError> {
    if output.trim().is_empty() {
        return Err(DecisionError::Empty);
    }

    let value: serde_json::Value =
        serde_json::from_str(output).map_err(|e| DecisionError::InvalidJson(e.to_string()))?;

    let object = value.as_object().ok_or(DecisionError::NotAnObject)?;

    let (field, selector) = fields
        .iter()
        .find_map(|field| match object.get(field) {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some((field, v)),
        })
        .ok_or_else(|| DecisionError::MissingField(fields.to_vec()))?;

    match selector.as_str() {
        Some(branch) if !branch.is_empty() => Ok(BranchDecision {
            branch: branch.to_string(),
            field: field.clone(),
            raw: value.clone(),
        }),
        _ => Err(DecisionError::InvalidField(field.clone())),
    }
}

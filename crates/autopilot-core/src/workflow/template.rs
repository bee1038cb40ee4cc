//! Prompt templates.
//!
//! A step's prompt is a plain string with `${...}` placeholders:
//!
//! - `${customer_message}`: the inquiry currently typed into the intake box
//! - `${previous_step_output}`: output of the step's last dependency (`{}` if none)
//! - `${variables.<key>}` or `${<key>}`: from the workflow's `variables` block
//!
//! Unknown placeholders are left as-is. Rendering is a single pass over the
//! template, so placeholder-looking text inside a customer message is never
//! expanded.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Substituted for `${previous_step_output}` when the step has no upstream output.
pub const EMPTY_PREVIOUS_OUTPUT: &str = "{}";

/// Inputs available to a prompt template at render time.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub customer_message: &'a str,
    pub previous_step_output: Option<&'a str>,
}

/// A step prompt with `${...}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names of all placeholders referenced by this template, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        placeholder_re()
            .captures_iter(&self.0)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Render the template. Pure: no I/O, no environment lookups.
    pub fn render(&self, ctx: &PromptContext<'_>, variables: &HashMap<String, String>) -> String {
        placeholder_re()
            .replace_all(&self.0, |caps: &Captures| {
                let key = &caps[1];
                match key {
                    "customer_message" => ctx.customer_message.to_string(),
                    "previous_step_output" => ctx
                        .previous_step_output
                        .unwrap_or(EMPTY_PREVIOUS_OUTPUT)
                        .to_string(),
                    _ => {
                        let name = key.strip_prefix("variables.").unwrap_or(key);
                        variables
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| caps[0].to_string())
                    }
                }
            })
            .into_owned()
    }
}

impl From<&str> for PromptTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PromptTemplate {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"))
}

//! Workflow name validation
//!
//! Names become `<name>.json` filenames on the backend, so path-unsafe
//! characters are rejected before any network call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{FlowError, Result};

/// Characters that would break the server-side `<name>.json` filename:
/// path separators, shell-unfriendly punctuation and control characters.
/// Anything else, including non-Latin scripts, is accepted.
static UNSAFE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("valid regex"));

/// Maximum workflow name length accepted by the backend
const MAX_NAME_LEN: usize = 120;

/// Validate a workflow name, returning the trimmed form.
pub fn validate_workflow_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FlowError::validation("Workflow name must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(FlowError::validation(format!(
            "Workflow name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }
    if trimmed.starts_with('.') {
        return Err(FlowError::validation(
            "Workflow name must not start with '.'",
        ));
    }
    if UNSAFE_RE.is_match(trimmed) {
        return Err(FlowError::validation(format!(
            "Workflow name '{}' contains characters not allowed in filenames (/ \\ : * ? \" < > |)",
            trimmed
        )));
    }
    Ok(trimmed)
}

/// Filename the backend stores this workflow under
pub fn workflow_filename(name: &str) -> String {
    format!("{}.json", name)
}

/// Strip a trailing `.json` if present (load accepts either form)
pub fn strip_json_ext(name: &str) -> &str {
    name.strip_suffix(".json").unwrap_or(name)
}

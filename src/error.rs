//! Error types with fix suggestions

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Errors are caught at the CLI/action boundary and surfaced as
/// notifications; none of them are fatal to the session.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Validation error: {reason}")]
    Validation { reason: String },

    #[error("Workflow '{name}' already exists")]
    NameConflict { name: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend rejected the request; `detail` is the server's message
    /// surfaced verbatim.
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Stream error: {details}")]
    Stream { details: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {reason}")]
    Config { reason: String },

    #[error("Execution canceled")]
    Canceled,
}

impl FlowError {
    /// Validation failure with a reason shown to the user
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Mid-stream failure
    pub fn stream(details: impl Into<String>) -> Self {
        Self::Stream {
            details: details.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

impl FixSuggestion for FlowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowError::Validation { .. } => {
                Some("Add at least one node to the workflow before saving or running it")
            }
            FlowError::NameConflict { .. } => {
                Some("Pick a different name, or re-run with --yes to overwrite")
            }
            FlowError::Network(_) => {
                Some("Check the backend is reachable (XGEN_API_URL or api_url in config.toml)")
            }
            FlowError::Api { .. } => Some("The backend rejected the request; see the detail above"),
            FlowError::Stream { .. } => {
                Some("Partial output may have been kept; re-run the workflow to retry")
            }
            FlowError::Json(_) => Some("Check the workflow file is valid JSON"),
            FlowError::Io(_) => Some("Check file paths and permissions"),
            FlowError::Config { .. } => Some("Check ~/.config/xflow/config.toml syntax"),
            FlowError::Canceled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_message() {
        let err = FlowError::validation("empty workflow");
        assert_eq!(err.to_string(), "Validation error: empty workflow");
    }

    #[test]
    fn api_error_surfaces_detail_verbatim() {
        let err = FlowError::Api {
            status: 422,
            detail: "workflow name contains invalid characters".into(),
        };
        assert!(err
            .to_string()
            .contains("workflow name contains invalid characters"));
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn fix_suggestions_present_for_user_facing_errors() {
        assert!(FlowError::validation("x").fix_suggestion().is_some());
        assert!(FlowError::NameConflict { name: "W".into() }
            .fix_suggestion()
            .is_some());
        assert!(FlowError::Canceled.fix_suggestion().is_none());
    }
}

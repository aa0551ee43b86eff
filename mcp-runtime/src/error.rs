use perch_core::error::codes;
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Every non-fatal failure a tool call can end in. All variants are turned
/// into an error envelope at the dispatch boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Missing or malformed argument, detected before any network call.
    #[error("{message}")]
    Validation { field: String, message: String },
    #[error("Service not initialized: no authenticated session")]
    NotReady,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("Failed to post tweet {step} of {total} in thread: {reason}")]
    ThreadStep {
        step: usize,
        total: usize,
        reason: String,
    },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ToolError::Validation { .. } => codes::VALIDATION_FAILED,
            ToolError::NotReady => codes::SESSION_NOT_READY,
            ToolError::Upstream(_) => codes::UPSTREAM_ERROR,
            ToolError::ThreadStep { .. } => codes::THREAD_STEP_FAILED,
            ToolError::UnknownTool(_) => codes::UNKNOWN_TOOL,
        }
    }

    /// Message for the error envelope. Upstream errors without a description
    /// fall back to the tool's own failure message.
    pub fn envelope_message(&self, fallback: &str) -> String {
        match self {
            ToolError::Upstream(err) => err.description().unwrap_or(fallback).to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_without_description_uses_fallback() {
        let err = ToolError::from(UpstreamError::Api {
            status: 503,
            message: String::new(),
        });
        assert_eq!(err.envelope_message("Failed to fetch tweets"), "Failed to fetch tweets");
        assert_eq!(err.code(), codes::UPSTREAM_ERROR);
    }

    #[test]
    fn upstream_description_passes_through() {
        let err = ToolError::from(UpstreamError::Api {
            status: 429,
            message: "Too Many Requests".to_string(),
        });
        assert_eq!(err.envelope_message("Failed to fetch tweets"), "Too Many Requests");
    }

    #[test]
    fn thread_step_names_the_step() {
        let err = ToolError::ThreadStep {
            step: 2,
            total: 3,
            reason: "duplicate".to_string(),
        };
        assert_eq!(
            err.envelope_message("unused"),
            "Failed to post tweet 2 of 3 in thread: duplicate"
        );
    }
}

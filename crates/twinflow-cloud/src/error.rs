//! Cloud provisioning error taxonomy
//!
//! Two caller-facing classes: client-class (configuration, drift,
//! validation — your input is wrong, never retried) and upstream-class
//! (transient/permanent provider failures). Transports branch on
//! [`CloudError::is_client_error`] when reporting.

use crate::validator::Violation;
use thiserror::Error;
use twinflow_core::CoreError;

#[derive(Error, Debug)]
pub enum CloudError {
    /// Missing or inconsistent configuration. Never retried.
    #[error("Invalid configuration: {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// Existing resource disagrees with the requested spec.
    /// Requires explicit destroy-then-recreate, never auto-resolved.
    #[error("Resource drift on {resource}: {reason}")]
    Drift { resource: String, reason: String },

    /// Network failure or 5xx from a provider. Retryable with backoff.
    #[error("Transient provider failure during {operation}: {reason}")]
    Transient { operation: String, reason: String },

    /// 4xx from a bridge call or an explicit dependency-not-found.
    /// Fails fast, no retry.
    #[error("Permanent provider failure during {operation}: {reason}")]
    Permanent { operation: String, reason: String },

    /// Aggregated validator rejections, one entry per violated field.
    #[error("Validation failed ({} violation(s)):\n{}", .0.len(), format_violations(.0))]
    Validation(Vec<Violation>),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl CloudError {
    /// Client-class: the caller's input is wrong.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CloudError::Configuration { .. }
                | CloudError::Drift { .. }
                | CloudError::Validation(_)
                | CloudError::Core(_)
        )
    }

    /// Only transient upstream failures may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Transient { .. })
    }

    pub fn transient(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::Transient {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn permanent(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::Permanent {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn drift(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::Drift {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let drift = CloudError::drift("table", "capacity mismatch");
        assert!(drift.is_client_error());
        assert!(!drift.is_retryable());

        let transient = CloudError::transient("create", "503");
        assert!(!transient.is_client_error());
        assert!(transient.is_retryable());

        let permanent = CloudError::permanent("relay", "404");
        assert!(!permanent.is_client_error());
        assert!(!permanent.is_retryable());
    }
}

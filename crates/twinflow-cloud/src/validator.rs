//! Validation contract for user-supplied config and function code
//!
//! Structural checks only; full syntactic validation of function code is an
//! external capability. Dispatch is a plain function table keyed by
//! [`ProviderId`] — no strategy-object hierarchy. All violations for one
//! input are aggregated into a single error so the caller sees every
//! offending field at once.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use twinflow_core::ProviderId;

/// One violated field/line with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub line: Option<usize>,
    pub reason: String,
}

impl Violation {
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            line: None,
            reason: reason.into(),
        }
    }

    pub fn line(field: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            line: Some(line),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", self.field, line, self.reason),
            None => write!(f, "{}: {}", self.field, self.reason),
        }
    }
}

const MAX_CODE_BYTES: usize = 512 * 1024;

/// Validate a user-supplied configuration document
///
/// `kind` selects the schema fragment ("function", "table", "workflow").
pub fn validate_config(kind: &str, content: &serde_json::Value) -> Result<()> {
    let mut violations = Vec::new();

    if content.is_null() {
        violations.push(Violation::field(kind, "設定が空です"));
        return aggregate(violations);
    }

    match kind {
        "function" => {
            require_string(content, "handler", &mut violations);
            require_string(content, "runtime", &mut violations);
        }
        "table" => {
            require_string(content, "partition-key", &mut violations);
        }
        "workflow" => {
            if content.get("states").map(|s| !s.is_object()).unwrap_or(true) {
                violations.push(Violation::field("states", "states オブジェクトが必要です"));
            }
        }
        other => {
            violations.push(Violation::field(
                other,
                "不明な設定種別です",
            ));
        }
    }

    aggregate(violations)
}

/// Validate user-supplied function code for a provider runtime
pub fn validate_code(provider: ProviderId, code: &str) -> Result<()> {
    let validator = code_validator(provider);
    aggregate(validator(code))
}

type CodeValidator = fn(&str) -> Vec<Violation>;

/// Provider-keyed function table (resolved once, no per-call branching)
fn code_validator(provider: ProviderId) -> CodeValidator {
    match provider {
        ProviderId::Aws => validate_aws_code,
        ProviderId::Azure => validate_azure_code,
        ProviderId::Gcp => validate_gcp_code,
    }
}

fn common_code_checks(code: &str, violations: &mut Vec<Violation>) {
    if code.trim().is_empty() {
        violations.push(Violation::line("code", 1, "コードが空です"));
    }
    if code.len() > MAX_CODE_BYTES {
        violations.push(Violation::field(
            "code",
            format!("コードサイズが上限 {MAX_CODE_BYTES} bytes を超えています"),
        ));
    }
}

fn entry_point_check(code: &str, marker: &str, violations: &mut Vec<Violation>) {
    if !code.contains(marker) {
        violations.push(Violation::field(
            "code",
            format!("エントリポイント '{marker}' が見つかりません"),
        ));
    }
}

fn validate_aws_code(code: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    common_code_checks(code, &mut violations);
    if !code.trim().is_empty() {
        entry_point_check(code, "handler", &mut violations);
    }
    violations
}

fn validate_azure_code(code: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    common_code_checks(code, &mut violations);
    if !code.trim().is_empty() {
        entry_point_check(code, "main", &mut violations);
    }
    violations
}

fn validate_gcp_code(code: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    common_code_checks(code, &mut violations);
    if !code.trim().is_empty() {
        entry_point_check(code, "entry_point", &mut violations);
    }
    violations
}

fn require_string(content: &serde_json::Value, field: &str, violations: &mut Vec<Violation>) {
    if content.get(field).and_then(|v| v.as_str()).is_none() {
        violations.push(Violation::field(
            field,
            "必須の文字列フィールドがありません",
        ));
    }
}

fn aggregate(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CloudError::Validation(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_config_requires_handler_and_runtime() {
        let err = validate_config("function", &json!({})).unwrap_err();
        match err {
            CloudError::Validation(violations) => {
                let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
                assert!(fields.contains(&"handler"));
                assert!(fields.contains(&"runtime"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(
            validate_config(
                "function",
                &json!({"handler": "index.handler", "runtime": "nodejs20.x"})
            )
            .is_ok()
        );
    }

    #[test]
    fn test_violations_are_aggregated_not_first_only() {
        // 空コードはすべてのプロバイダーで1件にまとまる
        let err = validate_code(ProviderId::Aws, "").unwrap_err();
        assert!(matches!(err, CloudError::Validation(ref v) if v.len() == 1));

        // エントリポイント欠落は行番号なしのフィールド違反
        let err = validate_code(ProviderId::Azure, "def other(): pass").unwrap_err();
        assert!(matches!(err, CloudError::Validation(ref v) if v.len() == 1));
    }

    #[test]
    fn test_code_validator_table_per_provider() {
        assert!(validate_code(ProviderId::Aws, "exports.handler = x").is_ok());
        assert!(validate_code(ProviderId::Azure, "def main(req): pass").is_ok());
        assert!(validate_code(ProviderId::Gcp, "entry_point = run").is_ok());
    }
}

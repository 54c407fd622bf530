//! Google Cloud adapter errors

use twinflow_cloud::CloudError;

#[derive(Debug, thiserror::Error)]
pub enum GcpError {
    #[error("gcloud CLI がインストールされていません")]
    CliNotFound,

    #[error("gcloud コマンドが失敗しました: {stderr}")]
    CommandFailed { stderr: String },

    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    #[error("このプロバイダでは {0} を提供できません")]
    Unsupported(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON エラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GcpError>;

/// stderr から NotFound 系の失敗を判定する
pub(crate) fn is_not_found(stderr: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "NOT_FOUND",
        "not found",
        "does not exist",
        "404",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

/// stderr から一時的失敗（リトライ可能）を判定する
pub(crate) fn is_transient(stderr: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "RESOURCE_EXHAUSTED",
        "UNAVAILABLE",
        "DEADLINE_EXCEEDED",
        "timed out",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

impl From<GcpError> for CloudError {
    fn from(err: GcpError) -> Self {
        match err {
            GcpError::NotFound(what) => {
                CloudError::permanent("gcloud", format!("dependency not found: {what}"))
            }
            GcpError::Unsupported(kind) => CloudError::Configuration {
                field: "gcp".to_string(),
                reason: format!("このプロバイダでは {kind} を提供できません"),
            },
            GcpError::CommandFailed { stderr } if is_transient(&stderr) => {
                CloudError::transient("gcloud", stderr)
            }
            GcpError::CommandFailed { stderr } => CloudError::permanent("gcloud", stderr),
            GcpError::CliNotFound => CloudError::Configuration {
                field: "gcloud".to_string(),
                reason: "gcloud CLI がインストールされていません".to_string(),
            },
            GcpError::Io(e) => CloudError::Io(e),
            GcpError::Json(e) => CloudError::Json(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("ERROR: (gcloud.functions.describe) NOT_FOUND"));
        assert!(!is_not_found("ERROR: (gcloud) PERMISSION_DENIED"));
    }

    #[test]
    fn test_unsupported_is_client_error() {
        let err: CloudError = GcpError::Unsupported("device-gateway".to_string()).into();
        assert!(err.is_client_error());
    }
}

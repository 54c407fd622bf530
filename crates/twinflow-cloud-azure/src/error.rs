//! Azure adapter errors

use twinflow_cloud::CloudError;

#[derive(Debug, thiserror::Error)]
pub enum AzureError {
    #[error("az CLI がインストールされていません")]
    CliNotFound,

    #[error("az コマンドが失敗しました: {stderr}")]
    CommandFailed { stderr: String },

    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON エラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AzureError>;

/// stderr から NotFound 系の失敗を判定する
pub(crate) fn is_not_found(stderr: &str) -> bool {
    const MARKERS: [&str; 5] = [
        "ResourceNotFound",
        "NotFound",
        "was not found",
        "does not exist",
        "could not be found",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

/// stderr から一時的失敗（リトライ可能）を判定する
pub(crate) fn is_transient(stderr: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "TooManyRequests",
        "ServiceUnavailable",
        "InternalServerError",
        "timed out",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::NotFound(what) => {
                CloudError::permanent("az", format!("dependency not found: {what}"))
            }
            AzureError::CommandFailed { stderr } if is_transient(&stderr) => {
                CloudError::transient("az", stderr)
            }
            AzureError::CommandFailed { stderr } => CloudError::permanent("az", stderr),
            AzureError::CliNotFound => CloudError::Configuration {
                field: "az".to_string(),
                reason: "az CLI がインストールされていません".to_string(),
            },
            AzureError::Io(e) => CloudError::Io(e),
            AzureError::Json(e) => CloudError::Json(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("ERROR: (ResourceNotFound) The Resource ..."));
        assert!(is_not_found("The workflow 'x' does not exist."));
        assert!(!is_not_found("ERROR: (AuthorizationFailed) ..."));
    }

    #[test]
    fn test_transient_maps_to_retryable() {
        let err: CloudError = AzureError::CommandFailed {
            stderr: "ERROR: (TooManyRequests) Rate limit exceeded".to_string(),
        }
        .into();
        assert!(err.is_retryable());
    }
}

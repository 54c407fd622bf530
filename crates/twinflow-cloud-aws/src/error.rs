use thiserror::Error;
use twinflow_cloud::CloudError;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("aws CLI がインストールされていません")]
    CliNotFound,

    #[error("aws コマンドが失敗しました: {stderr}")]
    CommandFailed { stderr: String },

    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON エラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AwsError>;

/// stderr から NotFound 系の失敗を判定する
pub(crate) fn is_not_found(stderr: &str) -> bool {
    const MARKERS: [&str; 6] = [
        "ResourceNotFoundException",
        "NotFoundException",
        "NoSuchEntity",
        "NoSuchBucket",
        "(404)",
        "does not exist",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

/// 一時的な失敗（スロットリング、5xx）かどうか
pub(crate) fn is_transient(stderr: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "ThrottlingException",
        "ServiceUnavailable",
        "InternalError",
        "timed out",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::NotFound(name) => {
                CloudError::permanent("aws", format!("dependency not found: {name}"))
            }
            AwsError::CommandFailed { stderr } if is_transient(&stderr) => {
                CloudError::transient("aws", stderr)
            }
            AwsError::CommandFailed { stderr } => CloudError::permanent("aws", stderr),
            AwsError::CliNotFound => CloudError::Configuration {
                field: "aws".to_string(),
                reason: "aws CLI がインストールされていません".to_string(),
            },
            AwsError::Io(e) => CloudError::Io(e),
            AwsError::Json(e) => CloudError::Json(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(is_not_found("An error occurred (ResourceNotFoundException) ..."));
        assert!(!is_not_found("AccessDenied"));
        assert!(is_transient("ThrottlingException: Rate exceeded"));
        assert!(!is_transient("ValidationException"));
    }

    #[test]
    fn test_transient_maps_to_retryable_cloud_error() {
        let err: CloudError = AwsError::CommandFailed {
            stderr: "ServiceUnavailable".to_string(),
        }
        .into();
        assert!(err.is_retryable());

        let err: CloudError = AwsError::CommandFailed {
            stderr: "AccessDenied".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
    }
}

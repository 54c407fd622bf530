//! Relay HTTP client
//!
//! Used by the source-side relay function at call time. Stateless and safe
//! under unbounded concurrent invocation: every send builds its request from
//! the connection entry alone, no shared mutable state.
//!
//! Retry policy (enforced here, at the calling layer):
//! - HTTP 4xx: permanent, fail fast, exactly one attempt
//! - HTTP 5xx, network error, timeout: transient, bounded retries with
//!   capped exponential backoff

use crate::error::Result;
use twinflow_cloud::{CloudError, RetryConfig};
use twinflow_registry::{ConnectionEntry, ConnectionRegistry};

/// Successful relay delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Attempts performed, the successful one included
    pub attempts: u32,
    pub status: u16,
}

pub struct RelayClient {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl RelayClient {
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry,
        }
    }

    /// Deliver one event across the bridge described by `entry`
    pub async fn send(
        &self,
        entry: &ConnectionEntry,
        event: &serde_json::Value,
    ) -> Result<RelayOutcome> {
        let operation = format!("relay {}", entry.conn_id);

        for attempt in 0..self.retry.max_attempts {
            let response = self
                .client
                .post(&entry.url)
                .bearer_auth(&entry.token)
                .timeout(self.retry.attempt_timeout())
                .json(event)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(RelayOutcome {
                            attempts: attempt + 1,
                            status: status.as_u16(),
                        });
                    }
                    if status.is_client_error() {
                        // 4xx は再試行しても成功しない
                        return Err(CloudError::permanent(
                            operation,
                            format!("HTTP {status}"),
                        )
                        .into());
                    }
                    tracing::warn!(
                        conn_id = %entry.conn_id,
                        attempt = attempt + 1,
                        %status,
                        "リレー呼び出しが失敗、再試行します"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        conn_id = %entry.conn_id,
                        attempt = attempt + 1,
                        error = %e,
                        "リレー呼び出しがネットワークエラー、再試行します"
                    );
                }
            }

            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay(attempt)).await;
            }
        }

        Err(CloudError::transient(
            operation,
            format!("{} 回の試行がすべて失敗しました", self.retry.max_attempts),
        )
        .into())
    }

    /// Look up the connection for `conn_id` and deliver one event.
    ///
    /// A missing entry fails closed with a permanent "remote endpoint not
    /// configured" error — never a silent no-op, which would mask data loss
    /// after an asymmetric partial teardown.
    pub async fn send_for(
        &self,
        registry: &ConnectionRegistry,
        conn_id: &str,
        event: &serde_json::Value,
    ) -> Result<RelayOutcome> {
        match registry.get(conn_id).await? {
            Some(entry) => self.send(&entry, event).await,
            None => Err(CloudError::permanent(
                format!("relay {conn_id}"),
                "remote endpoint not configured",
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use twinflow_core::{BoundaryEdge, ProviderId};

    /// 台本どおりのステータスを順に返すスタブ HTTP サーバー
    async fn scripted_server(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        tokio::spawn(async move {
            for status in statuses {
                let (mut stream, _) = listener.accept().await.unwrap();
                hits_clone.fetch_add(1, Ordering::SeqCst);

                // ヘッダー終端まで読む（ボディは読み捨てで十分）
                let mut buf = vec![0u8; 4096];
                let mut total = 0;
                loop {
                    let n = stream.read(&mut buf[total..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    total += n;
                    if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    503 => "Service Unavailable",
                    _ => "Status",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}"
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });

        (format!("http://{addr}/ingress"), hits)
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 10,
            max_delay_ms: 50,
            multiplier: 2.0,
            attempt_timeout_ms: 2000,
        }
    }

    fn entry_for(url: &str) -> ConnectionEntry {
        ConnectionEntry::new(
            BoundaryEdge::HotToTwin,
            ProviderId::Aws,
            ProviderId::Azure,
            url,
            "test-token",
        )
    }

    #[tokio::test]
    async fn test_retries_on_503_then_succeeds() {
        let (url, hits) = scripted_server(vec![503, 503, 200]).await;
        let client = RelayClient::new(fast_retry());

        let outcome = client
            .send(&entry_for(&url), &json!({"device": "d-1"}))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.status, 200);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_404_fails_fast_without_retry() {
        let (url, hits) = scripted_server(vec![404]).await;
        let client = RelayClient::new(fast_retry());

        let err = client
            .send(&entry_for(&url), &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BridgeError::Cloud(CloudError::Permanent { .. })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_transient() {
        let (url, hits) = scripted_server(vec![503, 503, 503]).await;
        let client = RelayClient::new(fast_retry());

        let err = client.send(&entry_for(&url), &json!({})).await.unwrap_err();

        assert!(matches!(
            err,
            BridgeError::Cloud(CloudError::Transient { .. })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_entry_fails_closed() {
        let dir = tempdir().unwrap();
        let registry = ConnectionRegistry::new(dir.path());
        let client = RelayClient::new(fast_retry());

        let err = client
            .send_for(&registry, "hot-twin--aws-to-azure", &json!({}))
            .await
            .unwrap_err();

        match err {
            BridgeError::Cloud(CloudError::Permanent { reason, .. }) => {
                assert_eq!(reason, "remote endpoint not configured");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

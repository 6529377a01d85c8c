//! Clustering service HTTP client.
//!
//! POSTs `[{amount, hour}, ...]` to `{base_url}/cluster` and decodes the
//! clustering result. One attempt per call; failures are classified into
//! [`ClusterError`] kinds.

use async_trait::async_trait;
use fraudgraph_core::analytics::{Clusterer, ClusteringResult, TransactionFeature};
use fraudgraph_core::ClusterError;
use std::time::Duration;
use tracing::debug;

/// Default clustering service URL.
pub const DEFAULT_ML_URL: &str = "http://localhost:8000";

/// [`Clusterer`] backed by the HTTP clustering service.
#[derive(Clone)]
pub struct HttpClusterer {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpClusterer {
    /// Create a client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service answers at all.
    pub async fn health_check(&self) -> bool {
        match self.client.get(format!("{}/docs", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn classify(&self, err: reqwest::Error) -> ClusterError {
        if err.is_timeout() {
            ClusterError::Timeout(self.timeout)
        } else if err.is_decode() {
            ClusterError::InvalidResponse(err.to_string())
        } else {
            ClusterError::Unavailable(err.to_string())
        }
    }
}

#[async_trait]
impl Clusterer for HttpClusterer {
    async fn cluster(&self, features: &[TransactionFeature]) -> Result<ClusteringResult, ClusterError> {
        let response = self
            .client
            .post(format!("{}/cluster", self.base_url))
            .json(features)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClusterError::Unavailable(format!(
                "clustering service error ({}): {}",
                status, body
            )));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let result: ClusteringResult = serde_json::from_slice(&body)
            .map_err(|e| ClusterError::InvalidResponse(e.to_string()))?;

        debug!(
            features = features.len(),
            clusters = result.clusters.len(),
            outliers = result.outliers.len(),
            "Clustering completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port, returning the base URL.
    /// With `delay`, the response is held back that long.
    async fn serve_once(status: &'static str, body: &'static str, delay: Option<Duration>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Read headers and the JSON body.
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn features() -> Vec<TransactionFeature> {
        vec![
            TransactionFeature { amount: 120.0, hour: 23 },
            TransactionFeature { amount: 80.0, hour: 10 },
        ]
    }

    #[tokio::test]
    async fn test_result_relayed() {
        let url = serve_once(
            "200 OK",
            r#"{"clusters":[{"amount":120.0,"hour":23,"cluster":1}],"inertia":1.5,"silhouette":0.4,"cluster_summary":[],"outliers":{"1":[]}}"#,
            None,
        )
        .await;
        let client = HttpClusterer::new(&url, Duration::from_secs(5));
        let result = client.cluster(&features()).await.unwrap();
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.inertia, Some(1.5));
        assert_eq!(result.silhouette, Some(0.4));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let url = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#, None).await;
        let client = HttpClusterer::new(&url, Duration::from_secs(5));
        let err = client.cluster(&features()).await.unwrap_err();
        assert!(matches!(err, ClusterError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let url = serve_once("200 OK", r#"{"unexpected": true}"#, None).await;
        let client = HttpClusterer::new(&url, Duration::from_secs(5));
        let err = client.cluster(&features()).await.unwrap_err();
        assert!(matches!(err, ClusterError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let url = serve_once("200 OK", r#"{"clusters":[]}"#, Some(Duration::from_secs(5))).await;
        let client = HttpClusterer::new(&url, Duration::from_millis(200));
        let err = client.cluster(&features()).await.unwrap_err();
        assert!(matches!(err, ClusterError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpClusterer::new(&format!("http://127.0.0.1:{}/", port), Duration::from_secs(2));
        assert_eq!(client.base_url(), format!("http://127.0.0.1:{}", port));
        let err = client.cluster(&features()).await.unwrap_err();
        assert!(matches!(err, ClusterError::Unavailable(_)));
    }
}

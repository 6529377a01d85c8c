//! HTTP error responses.
//!
//! Bodies are `{"error": ..., "details"?: ...}`. Internal failures are logged
//! in full and answered with a generic message. Retryable failures carry a
//! `Retry-After` header and `"retryable": true`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fraudgraph_core::{ClusterError, FraudError};
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

/// Seconds suggested to clients before retrying a timed-out request.
const RETRY_AFTER_SECS: u64 = 5;

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details,
                retryable: false,
            },
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg, None)
    }

    /// Entity CRUD was requested but the server runs without Neo4j.
    pub fn graph_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "graph store not configured",
            Some("entity endpoints require a Neo4j connection".to_string()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_retryable(&self) -> bool {
        self.body.retryable
    }

    fn retryable(mut self, retryable: bool) -> Self {
        self.body.retryable = retryable;
        self
    }
}

impl From<FraudError> for ApiError {
    fn from(err: FraudError) -> Self {
        let retryable = err.is_retryable();
        let api = match err {
            FraudError::Validation(msg) => Self::bad_request(msg),
            e @ FraudError::Conflict(_) => Self::bad_request(e.to_string()),
            e @ FraudError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, e.to_string(), None),
            FraudError::Timeout { operation, after } => {
                tracing::error!(operation, timeout_secs = after.as_secs(), "Request failed: query timeout");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "graph query timed out",
                    Some(format!("{} did not complete within {}s; retry later", operation, after.as_secs())),
                )
            }
            FraudError::Clustering(e) => {
                tracing::error!(error = %e, "Request failed: clustering");
                let kind = match e {
                    ClusterError::Unavailable(_) => "service unreachable or returned an error",
                    ClusterError::Timeout(_) => "service timed out",
                    ClusterError::InvalidResponse(_) => "service returned an invalid response",
                };
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "clustering unavailable",
                    Some(kind.to_string()),
                )
            }
            e @ (FraudError::Query(_) | FraudError::Config(_)) => {
                tracing::error!(error = %e, "Request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error", None)
            }
        };
        api.retryable(retryable)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid request body", Some(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid query string", Some(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retryable = self.body.retryable;
        let mut response = (self.status, Json(self.body)).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(FraudError::validation("x")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(FraudError::conflict("owns")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(FraudError::not_found("Customer 'c1'")).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(FraudError::query("bolt: connection reset")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(FraudError::Timeout {
                operation: "fraud_rings",
                after: Duration::from_secs(30)
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_query_detail_not_exposed() {
        let err = ApiError::from(FraudError::query("MATCH (n) secret text"));
        assert_eq!(err.body.error, "internal server error");
        assert!(err.body.details.is_none());
    }

    #[test]
    fn test_timeouts_marked_retryable() {
        let response = ApiError::from(FraudError::Timeout {
            operation: "cascade_chains",
            after: Duration::from_secs(30),
        })
        .into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");

        let err = ApiError::from(FraudError::Clustering(ClusterError::Timeout(Duration::from_secs(10))));
        assert!(err.is_retryable());
        assert!(err.into_response().headers().contains_key(header::RETRY_AFTER));
    }

    #[test]
    fn test_permanent_failures_not_retryable() {
        let err = ApiError::from(FraudError::Clustering(ClusterError::Unavailable("refused".into())));
        assert!(!err.is_retryable());
        assert!(!err.into_response().headers().contains_key(header::RETRY_AFTER));
        let body = serde_json::to_value(&ApiError::from(FraudError::validation("x")).body).unwrap();
        assert!(body.get("retryable").is_none());
    }

    #[test]
    fn test_conflict_message_says_already_exists() {
        let err = ApiError::from(FraudError::conflict("owns relation from 'c1' to 'a1'"));
        assert!(err.body.error.ends_with("already exists"));
    }
}

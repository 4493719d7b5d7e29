//! Error responses.
//!
//! # Design Decisions
//! - Error bodies are `{"error": <kind>, "message": <text>}` and never carry a
//!   `status` field, so `status` in a body always means a scan completed
//! - Problems with the upload map to 4xx, engine and capacity problems to 5xx

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::scan::{ErrorKind, ScanError};

/// JSON body returned for every failed scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedPayload | ErrorKind::NoFilePart => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::CapacityTimeout => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::ReadError
        | ErrorKind::EngineProcessStartError
        | ErrorKind::EngineConfigError
        | ErrorKind::EngineExecutionError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = ErrorBody {
            error: kind.as_str().to_string(),
            message: self.to_string(),
        };
        (status_for(kind), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::time::Duration;

    async fn parts(err: ScanError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn client_errors_are_4xx() {
        let (status, body) = parts(ScanError::NoFilePart).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no_file_part");
        assert!(body.get("status").is_none());

        let (status, body) = parts(ScanError::PayloadTooLarge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "payload_too_large");
    }

    #[tokio::test]
    async fn engine_errors_are_5xx() {
        let (status, body) = parts(ScanError::EngineConfig { output: "bad db".into() }).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "engine_config_error");
        assert!(body["message"].as_str().unwrap().contains("bad db"));

        let (status, _) = parts(ScanError::EngineTimeout(Duration::from_secs(1))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn capacity_timeout_is_unavailable() {
        let (status, body) = parts(ScanError::CapacityTimeout(Duration::from_secs(2))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "capacity_timeout");
    }
}

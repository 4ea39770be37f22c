use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{CapacityError, ErrorKind};

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: ErrorKind,
    message: String,
}

impl IntoResponse for CapacityError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match self.kind {
            ErrorKind::Internal => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            ErrorKind::SolverInvocation => {
                tracing::warn!(error = %self, "solver unavailable");
                self.message
            }
            _ => {
                tracing::debug!(error = %self, "client error");
                self.message
            }
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            kind: self.kind,
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for CapacityError {
    fn from(rejection: JsonRejection) -> Self {
        CapacityError::configuration(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_configuration_error_response() {
        let response = CapacityError::configuration("invalid bracket").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["kind"], "CONFIGURATION");
        assert_eq!(body["message"], "invalid bracket");
    }

    #[tokio::test]
    async fn test_internal_error_message_hidden() {
        let response = CapacityError::internal("lock poisoned at x.rs").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "An internal error occurred");
    }

    #[test]
    fn test_status_per_kind() {
        let cases = [
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::Interruption, StatusCode::CONFLICT),
            (ErrorKind::GlskLimitation, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorKind::SolverInvocation, StatusCode::BAD_GATEWAY),
        ];
        for (kind, status) in cases {
            assert_eq!(CapacityError::new(kind, "x").into_response().status(), status);
        }
    }
}

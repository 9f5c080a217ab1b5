//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use medassist_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Core(#[from] Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => match e {
                Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Error::CorruptDocument(_) | Error::InvalidChunkingConfig(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                Error::InvalidTransition { .. } => StatusCode::CONFLICT,
                Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
                Error::EmbeddingService(_)
                | Error::IndexService(_)
                | Error::GenerationService(_) => StatusCode::BAD_GATEWAY,
                Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                Error::Config(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "internal server error".to_string()
        } else {
            if status.is_server_error() {
                tracing::warn!(error = %self, "Upstream service failed");
            }
            self.to_string()
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medassist_core::ServiceFailure;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::UnsupportedMediaType("text/plain".into()), 415),
            (Error::CorruptDocument("xref".into()), 422),
            (Error::InvalidChunkingConfig("overlap".into()), 422),
            (
                Error::InvalidTransition {
                    stage: "upload".into(),
                    action: "chunk".into(),
                },
                409,
            ),
            (Error::SessionNotFound("x".into()), 404),
            (Error::IndexService(ServiceFailure::http(500, "")), 502),
            (Error::Timeout("search".into()), 504),
            (Error::Config("AZURE_SEARCH_ADMIN_KEY".into()), 500),
            (Error::Internal("bug".into()), 500),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status().as_u16(), expected);
        }
        assert_eq!(ApiError::BadRequest("q".into()).status(), StatusCode::BAD_REQUEST);
    }
}

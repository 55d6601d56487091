use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgriError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Serialize for AgriError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type AgriResult<T> = Result<T, AgriError>;

impl AgriError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AgriError::Validation(_) | AgriError::Base64(_) => StatusCode::BAD_REQUEST,
            AgriError::NotFound(_) => StatusCode::NOT_FOUND,
            AgriError::Upstream(_) | AgriError::Network(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AgriError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AgriError::Database(ref e) => {
                tracing::error!("Database Error: {:?}", e);
                "A database error occurred.".to_string()
            }
            AgriError::Validation(msg) => msg,
            AgriError::NotFound(what) => format!("{} not found", what),
            AgriError::Base64(e) => format!("Invalid image encoding: {}", e),
            AgriError::Upstream(msg) => {
                tracing::warn!("Upstream Error: {}", msg);
                "An external service returned an error.".to_string()
            }
            AgriError::Network(e) => {
                tracing::warn!("Network Error: {:?}", e);
                "Failed to reach an external service.".to_string()
            }
            AgriError::Internal(msg) => {
                tracing::error!("Internal Error: {}", msg);
                "An internal server error occurred.".to_string()
            }
            _ => {
                tracing::error!("Unhandled Error: {:?}", self);
                "An unknown error occurred.".to_string()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AgriError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AgriError::NotFound("Crop".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AgriError::Upstream("502".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AgriError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_keeps_status() {
        let res = AgriError::NotFound("Disease".into()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}

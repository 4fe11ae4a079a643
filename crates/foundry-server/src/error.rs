//! Error handling for the API server

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use foundry_registry::RegistryError;
use serde_json::json;
use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Stable machine code and HTTP status for each error class.
    fn code_and_status(&self) -> (&'static str, StatusCode) {
        match self {
            ApiError::Registry(e) => match e {
                RegistryError::Validation(_) => {
                    ("PLUGIN_VALIDATION_ERROR", StatusCode::UNPROCESSABLE_ENTITY)
                }
                RegistryError::Conflict { .. } => ("VERSION_CONFLICT", StatusCode::CONFLICT),
                RegistryError::PluginNotFound(_)
                | RegistryError::VersionNotFound { .. }
                | RegistryError::FileNotFound { .. } => ("NOT_FOUND", StatusCode::NOT_FOUND),
                RegistryError::Inconsistent(_) => {
                    ("STORAGE_INCONSISTENCY", StatusCode::INTERNAL_SERVER_ERROR)
                }
                RegistryError::Storage(s) if s.is_retryable() => {
                    ("STORAGE_UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE)
                }
                RegistryError::Storage(_) => {
                    ("STORAGE_ERROR", StatusCode::INTERNAL_SERVER_ERROR)
                }
                RegistryError::Config(_) => {
                    ("CONFIGURATION_ERROR", StatusCode::INTERNAL_SERVER_ERROR)
                }
                _ => ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
            },
            ApiError::Validation(_) => {
                ("VALIDATION_ERROR", StatusCode::UNPROCESSABLE_ENTITY)
            }
            ApiError::BadRequest(_) | ApiError::Serialization(_) => {
                ("BAD_REQUEST", StatusCode::BAD_REQUEST)
            }
            ApiError::Config(_) => ("CONFIGURATION_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Internal(_) | ApiError::Io(_) => {
                ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.code_and_status();

        // Server faults keep their detail in the logs, not the response.
        let message = if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let conflict = ApiError::Registry(RegistryError::Conflict {
            plugin: "demo".into(),
            version: "1.0.0".into(),
        });
        assert_eq!(conflict.code_and_status().1, StatusCode::CONFLICT);

        let missing = ApiError::Registry(RegistryError::PluginNotFound("demo".into()));
        assert_eq!(missing.code_and_status().1, StatusCode::NOT_FOUND);

        let invalid = ApiError::Registry(RegistryError::Validation("bad".into()));
        assert_eq!(
            invalid.code_and_status(),
            ("PLUGIN_VALIDATION_ERROR", StatusCode::UNPROCESSABLE_ENTITY)
        );

        let drift = ApiError::Registry(RegistryError::Inconsistent("gone".into()));
        assert_eq!(
            drift.code_and_status().1,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, AppError>;

/// PostgreSQL 唯一约束冲突
pub const UNIQUE_VIOLATION: &str = "23505";

/// Supabase (PostgREST / Storage) 返回的错误
#[derive(Error, Debug, Clone, Deserialize)]
#[error("store error {status}: {message}")]
pub struct StoreError {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "msg")]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Upstream responded with {status}: {message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Validation error: {0}")]
    ValidatorError(#[from] validator::ValidationErrors),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_message, error_code) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ("unexpected error".to_string(), "DATABASE_ERROR")
            }
            AppError::Configuration(e) => {
                tracing::error!("Configuration error: {}", e);
                (e.to_string(), "CONFIGURATION_ERROR")
            }
            AppError::Authentication(msg) => {
                (msg.clone(), "AUTHENTICATION_ERROR")
            }
            AppError::Validation(msg) => {
                (msg.clone(), "VALIDATION_ERROR")
            }
            AppError::NotFound(msg) => {
                (msg.clone(), "NOT_FOUND")
            }
            AppError::Conflict(msg) => {
                (msg.clone(), "CONFLICT")
            }
            AppError::BadRequest(msg) => {
                (msg.clone(), "BAD_REQUEST")
            }
            AppError::Timeout => {
                ("Request timeout".to_string(), "TIMEOUT")
            }
            AppError::Upstream { status, message } => {
                tracing::warn!("Upstream error {}: {}", status, message);
                (message.clone(), "UPSTREAM_ERROR")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("unexpected error".to_string(), "INTERNAL_ERROR")
            }
            AppError::RateLimitExceeded => {
                ("Rate limit exceeded".to_string(), "RATE_LIMIT_EXCEEDED")
            }
            AppError::ExternalService(msg) => {
                tracing::error!("External service error: {}", msg);
                ("External service error".to_string(), "EXTERNAL_SERVICE_ERROR")
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                ("unexpected error".to_string(), "SERIALIZATION_ERROR")
            }
            AppError::Request(e) => {
                tracing::error!("Request error: {}", e);
                ("External service error".to_string(), "REQUEST_ERROR")
            }
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {}", e);
                ("Failed to sign service account token".to_string(), "JWT_ERROR")
            }
            AppError::ValidatorError(e) => {
                let validation_errors = e
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        (
                            field.to_string(),
                            errors.iter().map(|e| e.message.as_ref().unwrap_or(&"Invalid value".into()).to_string()).collect::<Vec<_>>()
                        )
                    })
                    .collect::<std::collections::HashMap<String, Vec<String>>>();

                return (
                    status,
                    Json(json!({
                        "error": "Validation failed",
                        "code": "VALIDATION_ERROR",
                        "details": validation_errors
                    }))
                ).into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": error_code
        }));

        (status, body).into_response()
    }
}

// 便利函数，用于创建常见错误
impl AppError {
    pub fn not_found(msg: &str) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::Authentication(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::ValidatorError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Upstream { status, .. } => *status,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::ExternalService(_) | AppError::Request(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// 从其他错误类型转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use registry::{GateError, RegistryError, RemoteError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No site is registered for this host")]
    TenantNotFound,

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    NotPermitted(#[from] GateError),

    #[error("Backend data file not found")]
    DataNotFound,

    #[error("Request body must be valid JSON")]
    MalformedPayload,

    #[error("Forbidden")]
    Forbidden,

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Refresh(#[from] RegistryError),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        AppError::InternalError(error.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::TenantNotFound | AppError::NotFound | AppError::DataNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::NotPermitted(_) | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Remote(remote) => match remote {
                RemoteError::InvalidTarget { .. } | RemoteError::NotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                RemoteError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                RemoteError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
                RemoteError::Request { .. }
                | RemoteError::Upstream { .. }
                | RemoteError::InvalidJson { .. } => StatusCode::BAD_GATEWAY,
            },
            AppError::Refresh(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::TenantNotFound => "tenant_not_found",
            AppError::NotFound => "not_found",
            AppError::NotPermitted(_) => "not_permitted",
            AppError::DataNotFound => "data_not_found",
            AppError::MalformedPayload => "invalid_json",
            AppError::Forbidden => "forbidden",
            AppError::Remote(remote) => remote.code(),
            AppError::Refresh(_) => "refresh_failed",
            AppError::InternalError(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Remote(remote) => json!({
                "error": self.code(),
                "message": self.to_string(),
                "slug": remote.slug(),
            }),
            AppError::InternalError(e) => {
                error!("Internal error: {e}");

                json!({ "error": self.code(), "message": "Internal error" })
            }
            _ => json!({ "error": self.code(), "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: String, message: String },

    #[error("Invalid host alias {0:?}, expected host=client")]
    InvalidAlias(String),

    #[error("Unsupported proxy scheme {0:?}")]
    InvalidScheme(String),
}

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::vendors::persona::PersonaError;
use crate::vendors::streaming::StreamingError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{vendor} returned status {status}: {message}")]
    Vendor {
        vendor: &'static str,
        status: u16,
        message: String,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps an upstream status onto the status we surface to the browser.
    /// Credential and server-side failures are ours, so they become 502.
    fn vendor_status(status: u16) -> StatusCode {
        match status {
            400 | 422 => StatusCode::BAD_REQUEST,
            404 => StatusCode::NOT_FOUND,
            409 => StatusCode::CONFLICT,
            429 => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                format!("{what} is not configured on this server"),
            ),
            AppError::Vendor {
                vendor,
                status,
                message,
            } => {
                tracing::error!("{vendor} error (status {status}): {message}");
                let code = match *status {
                    429 => "VENDOR_RATE_LIMITED",
                    401 | 403 => "VENDOR_AUTH_FAILED",
                    404 => "VENDOR_NOT_FOUND",
                    _ => "VENDOR_ERROR",
                };
                (Self::vendor_status(*status), code, format!("{vendor}: {message}"))
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PersonaError> for AppError {
    fn from(err: PersonaError) -> Self {
        match err {
            PersonaError::NotConfigured => AppError::NotConfigured("Persona API"),
            PersonaError::Api { status, message } => AppError::Vendor {
                vendor: "Persona API",
                status,
                message,
            },
            PersonaError::MissingField(field) => AppError::Vendor {
                vendor: "Persona API",
                status: 502,
                message: format!("response is missing '{field}'"),
            },
            other => AppError::Vendor {
                vendor: "Persona API",
                status: 502,
                message: other.to_string(),
            },
        }
    }
}

impl From<StreamingError> for AppError {
    fn from(err: StreamingError) -> Self {
        match err {
            StreamingError::NotConfigured => AppError::NotConfigured("Streaming provider"),
            StreamingError::Api { status, message } => AppError::Vendor {
                vendor: "Streaming provider",
                status,
                message,
            },
            StreamingError::Token(e) => AppError::Internal(anyhow::anyhow!("token signing failed: {e}")),
            other => AppError::Vendor {
                vendor: "Streaming provider",
                status: 502,
                message: other.to_string(),
            },
        }
    }
}

use std::any::Any;

use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    /// Path id that is not an integer. Counts as a validation failure.
    #[error("Invalid ID format, ID should be an integer")]
    InvalidId,

    /// Missing or unreadable request envelope.
    #[error("{0}")]
    Controller(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{message}")]
    Database {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{message}")]
    Service {
        message: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn database(message: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::Database {
            message: message.into(),
            source,
        }
    }

    pub fn service(message: impl Into<String>, source: AppError) -> Self {
        AppError::Service {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidId | AppError::Controller(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Database { .. } | AppError::Service { .. } | AppError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::InvalidId)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Every message from this error down to the root cause, joined by `: `.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = std::error::Error::source(err);
        }
        out
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: &'static str,
    pub status_code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            // the source chain stays in the log, the client only sees the message
            error!("request failed ({}): {}", status.as_u16(), self.chain());
        } else {
            debug!("request rejected ({}): {}", status.as_u16(), self);
        }

        let body = Json(ErrorResponse {
            status: "error",
            status_code: status.as_u16(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Renders a handler panic as an unclassified failure.
pub fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("request handler panicked");
    AppError::Internal.into_response()
}

//! Error taxonomy shared by the repository, the progress store and the session
//! controller.
//!
//! A locked step is not an error: `select_step` reports it through
//! [`crate::session::StepSelection::Locked`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LabError {
    /// Experiment or record missing where one was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Blank identifiers, out-of-range step numbers, malformed experiments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store failed. Always safe to retry.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),
}

pub type Result<T> = std::result::Result<T, LabError>;

impl LabError {
    pub fn not_found(what: impl Into<String>) -> Self {
        LabError::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        LabError::InvalidArgument(what.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LabError::TransientIo(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LabError::NotFound(_))
    }

    /// Short machine-readable kind used in HTTP/WS error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LabError::NotFound(_) => "not_found",
            LabError::InvalidArgument(_) => "invalid_argument",
            LabError::TransientIo(_) => "transient_io",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            LabError::NotFound(_) => StatusCode::NOT_FOUND,
            LabError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            LabError::TransientIo(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Reject blank identifiers before they reach a store.
pub fn require_id<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LabError::invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

impl IntoResponse for LabError {
    fn into_response(self) -> Response {
        let body = crate::protocol::ErrorOut {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::model::Portal;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Error taxonomy for the whole service. Client-side errors carry a
/// user-visible message; storage failures are reported generically and are
/// never distinguished from "not found" at the transport level.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad credentials. Deliberately does not say which part was wrong.
    #[error("invalid credentials")]
    Authentication,

    /// Authenticated, but no matching (or an inactive) profile for the
    /// claimed portal. No session token is issued when this is returned.
    #[error("no {0} access for this account")]
    RoleMismatch(Portal),

    /// A server-side authorization re-check failed.
    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    /// Storage or provider call failed for infrastructure reasons.
    #[error("storage error: {0}")]
    Remote(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
        }

        let (status, message) = match &self {
            AppError::Authentication => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::RoleMismatch(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Remote(err) => {
                error!("storage error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(err) => {
                error!("internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

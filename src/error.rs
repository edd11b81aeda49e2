use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepoError;

/// Error type returned by every handler and middleware.
///
/// Each variant maps to exactly one status code; only `Validation` and
/// `Conflict` echo their message to the client verbatim.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed client input.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credentials or token.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Covers both absent rows and rows owned by another user.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    /// Hashing, signing and store failures.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(e) => tracing::error!(error = ?e, "internal error"),
            ApiError::Unauthenticated(msg) => tracing::info!(reason = %msg, "unauthenticated"),
            ApiError::RateLimited => tracing::info!("rate limited"),
            ApiError::Timeout => tracing::warn!("request deadline exceeded"),
            other => tracing::debug!(error = %other, "client error"),
        }

        let body = ErrorBody {
            error: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("resource not found"),
            RepoError::Conflict(field) => ApiError::Conflict(format!("{field} already taken")),
            RepoError::Database(e) => ApiError::Internal(anyhow::Error::new(e)),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

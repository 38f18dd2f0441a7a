use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failures reaching or talking to the entity store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found")]
    NotFound,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transport(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Query(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// Outcome of a cache refresh or mutation that did not go through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cache has been closed")]
    Closed,
}

impl SyncError {
    /// Short text shown next to a stale view.
    pub fn user_message(&self, collection: &str) -> String {
        match self {
            SyncError::Store(StoreError::Transport(_)) => {
                format!("Failed to load {}. Check your internet connection.", collection)
            }
            SyncError::Store(StoreError::Query(_)) => {
                format!("The server rejected the request for {}.", collection)
            }
            SyncError::Store(StoreError::NotFound) => {
                format!("The requested item in {} no longer exists.", collection)
            }
            SyncError::Closed => "You have been signed out.".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not signed in")]
    Unauthorized,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Sync(SyncError::Store(err))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Sync(SyncError::Store(StoreError::NotFound)) => {
                (StatusCode::NOT_FOUND, "Not Found".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized | AppError::Sync(SyncError::Closed) => {
                (StatusCode::UNAUTHORIZED, "Sign in first".to_string())
            }
            AppError::Sync(SyncError::Store(StoreError::Query(msg))) => {
                error!("store rejected request: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, msg)
            }
            AppError::Sync(SyncError::Store(StoreError::Transport(msg))) => {
                error!("store unreachable: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Store is unreachable".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}

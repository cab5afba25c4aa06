use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use doc_store::StoreError;
use finder::FinderError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::core::config::ConfigError;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / routing ---
    #[error("{0}")]
    Validation(String),

    #[error("Couldn't get Finder with ID {id}. Available IDs: {available:?}")]
    FinderNotFound { id: String, available: Vec<u32> },

    // --- Pipeline ---
    #[error(transparent)]
    Finder(#[from] FinderError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // 4xx
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::FinderNotFound { .. } => StatusCode::NOT_FOUND,

            // 5xx
            AppError::Config(_)
            | AppError::Store(_)
            | AppError::Bind(_)
            | AppError::Server(_)
            | AppError::Finder(_)
            | AppError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::Validation(_) => "UNPROCESSABLE_ENTITY",
            AppError::FinderNotFound { .. } => "FINDER_NOT_FOUND",
            AppError::Finder(_) => "FINDER_FAILED",
            AppError::Join(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.error_code(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(err: axum::extract::rejection::PathRejection) -> Self {
        AppError::Validation(err.body_text())
    }
}

//! Error types for content loading and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a content file into a record.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected shape in {path}: {reason}")]
    Shape { path: PathBuf, reason: String },
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        LoadError::Json { path: path.into(), source }
    }

    pub fn shape(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LoadError::Shape { path: path.into(), reason: reason.into() }
    }
}

/// Failure of a whole `serve` or `build` run.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("template error: {0}")]
    Render(#[from] minijinja::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("refusing to clear {path}: it contains site content")]
    UnsafeOutDir { path: PathBuf },
}

impl SiteError {
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SiteError::Write { path: path.into(), source }
    }
}

/// JSON body returned for API errors
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Render error: {0}")]
    Render(#[from] minijinja::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::SessionNotFound(id) => {
                tracing::debug!(session_id = %id, "Session not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        error: "Session not found".to_string(),
                        details: Some(format!("Session ID: {}", id)),
                    },
                )
            }
            ApiError::Load(e) => {
                tracing::error!(error = %e, "Content load failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Failed to load content".to_string(),
                        details: Some(e.to_string()),
                    },
                )
            }
            ApiError::Render(e) => {
                tracing::error!(error = %e, "Template render failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Failed to render page".to_string(),
                        details: Some(e.to_string()),
                    },
                )
            }
            ApiError::Task(e) => {
                tracing::error!(error = %e, "Request task failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal error".to_string(),
                        details: None,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

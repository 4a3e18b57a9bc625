//! Error types shared across the crate.
//!
//! `DashboardError` is the only error a caller of the services ever sees: it
//! covers client-side validation. Remote and storage failures have their own
//! types and are absorbed by the sync layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DashboardError {
  #[error("Access code limit reached: a teacher may hold at most {limit} codes")]
  CodeLimitReached { limit: u32 },

  #[error("Access code {0} already exists")]
  DuplicateCode(String),

  #[error("Invalid access code {0}: use 4 to 16 characters from A-Z (no I/O) and 2-9")]
  InvalidCode(String),

  #[error("Custom access codes are disabled by the administrator")]
  CustomCodesDisabled,

  #[error("Missing required field: {0}")]
  MissingField(&'static str),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Access code {code} cannot be used: {reason}")]
  CodeUnavailable { code: String, reason: &'static str },

  #[error("Invalid state: {0}")]
  InvalidState(String),
}

impl IntoResponse for DashboardError {
  fn into_response(self) -> Response {
    let status = match &self {
      DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
      DashboardError::DuplicateCode(_) => StatusCode::CONFLICT,
      DashboardError::CodeLimitReached { .. } | DashboardError::CustomCodesDisabled => StatusCode::FORBIDDEN,
      DashboardError::InvalidState(_) => StatusCode::CONFLICT,
      _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    debug!(target: "classdesk", %status, error = %self, "Rejecting request");
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

/// Failure talking to the hosted data service.
#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("remote store disabled")]
  Disabled,

  #[error("remote store offline")]
  Offline,

  #[error("remote HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("remote returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("could not decode remote row: {0}")]
  Decode(#[from] serde_json::Error),
}

/// Failure persisting the local cache.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("local storage I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("local storage JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

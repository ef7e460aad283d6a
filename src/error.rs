// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Crate-wide error taxonomy. Every variant corresponds 1:1 to an error
//! kind from the external interface contract (`bad_request`,
//! `unauthorized`, `forbidden`, `not_found`, `conflict`,
//! `insufficient_funds`, `precondition_failed`, `timeout`, `unavailable`,
//! `internal`). HTTP handlers convert into these; `SwarmError` knows how
//! to render itself as a response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone)]
pub enum SwarmError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InsufficientFunds { available: String, required: String },
    PreconditionFailed(String),
    Timeout(String),
    Unavailable(String),
    Internal(String),
}

impl SwarmError {
    pub fn kind(&self) -> &'static str {
        match self {
            SwarmError::BadRequest(_) => "bad_request",
            SwarmError::Unauthorized(_) => "unauthorized",
            SwarmError::Forbidden(_) => "forbidden",
            SwarmError::NotFound(_) => "not_found",
            SwarmError::Conflict(_) => "conflict",
            SwarmError::InsufficientFunds { .. } => "insufficient_funds",
            SwarmError::PreconditionFailed(_) => "precondition_failed",
            SwarmError::Timeout(_) => "timeout",
            SwarmError::Unavailable(_) => "unavailable",
            SwarmError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SwarmError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SwarmError::Unauthorized(_) => StatusCode::BAD_REQUEST,
            SwarmError::Forbidden(_) => StatusCode::FORBIDDEN,
            SwarmError::NotFound(_) => StatusCode::NOT_FOUND,
            SwarmError::Conflict(_) => StatusCode::CONFLICT,
            SwarmError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            SwarmError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            SwarmError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SwarmError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SwarmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            SwarmError::BadRequest(m)
            | SwarmError::Unauthorized(m)
            | SwarmError::Forbidden(m)
            | SwarmError::NotFound(m)
            | SwarmError::Conflict(m)
            | SwarmError::PreconditionFailed(m)
            | SwarmError::Timeout(m)
            | SwarmError::Unavailable(m)
            | SwarmError::Internal(m) => m.clone(),
            SwarmError::InsufficientFunds { available, required } => format!(
                "insufficient funds: available {}, required {}",
                available, required
            ),
        }
    }
}

impl fmt::Display for SwarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for SwarmError {}

impl From<anyhow::Error> for SwarmError {
    fn from(err: anyhow::Error) -> Self {
        SwarmError::Internal(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub message: String,
}

impl crate::retry::Retryable for SwarmError {
    fn is_permanent(&self) -> bool {
        !matches!(self, SwarmError::Timeout(_) | SwarmError::Unavailable(_))
    }
}

impl IntoResponse for SwarmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            kind: self.kind(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

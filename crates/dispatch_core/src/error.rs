//! The core error taxonomy.
//!
//! Every callable operation returns `Result<T, CoreError>`. `ErrorKind` is the
//! stable, transport-independent taxonomy from the failure semantics table;
//! a transport adapter (HTTP, gRPC, a Firebase-style callable shim) maps
//! `ErrorKind` to its own status codes at the boundary — that mapping does
//! not live in this crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    InvalidArgument,
    NotFound,
    Forbidden,
    ServiceDisabled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::ServiceDisabled => "service_disabled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A single tagged error, ready to cross a transport boundary.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    /// Field-level details, e.g. `{"current_state": "accepted"}` on a stale
    /// transition. Never contains anything the caller couldn't already see.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// A `forbidden` that carries the document's current state, the way a
    /// stale accept/cancel should report it so the caller can refresh.
    pub fn forbidden_in_state(message: impl Into<String>, current_state: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Forbidden, message)
            .with_details(serde_json::json!({ "current_state": current_state.to_string() }))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn service_disabled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceDisabled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

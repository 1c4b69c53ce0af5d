//! Namespace error model and mapping helpers.
//! Every public operation returns `FsResult<T>`; each error carries a machine code
//! and a human-readable message naming the offending path.

use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FsError {
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },
    #[error("{code}: {message}")]
    AlreadyExists { code: String, message: String },
    #[error("{code}: {message}")]
    NotEmpty { code: String, message: String },
    #[error("{code}: {message}")]
    InvalidOperation { code: String, message: String },
    #[error("{code}: {message}")]
    Store { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl FsError {
    pub fn code_str(&self) -> &str {
        match self {
            FsError::NotFound { code, .. }
            | FsError::AlreadyExists { code, .. }
            | FsError::NotEmpty { code, .. }
            | FsError::InvalidOperation { code, .. }
            | FsError::Store { code, .. }
            | FsError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FsError::NotFound { message, .. }
            | FsError::AlreadyExists { message, .. }
            | FsError::NotEmpty { message, .. }
            | FsError::InvalidOperation { message, .. }
            | FsError::Store { message, .. }
            | FsError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { FsError::NotFound { code: code.into(), message: msg.into() } }
    pub fn already_exists(code: impl Into<String>, msg: impl Into<String>) -> Self { FsError::AlreadyExists { code: code.into(), message: msg.into() } }
    pub fn not_empty(code: impl Into<String>, msg: impl Into<String>) -> Self { FsError::NotEmpty { code: code.into(), message: msg.into() } }
    pub fn invalid(code: impl Into<String>, msg: impl Into<String>) -> Self { FsError::InvalidOperation { code: code.into(), message: msg.into() } }
    pub fn store(code: impl Into<String>, msg: impl Into<String>) -> Self { FsError::Store { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { FsError::Internal { code: code.into(), message: msg.into() } }

    pub fn is_not_found(&self) -> bool { matches!(self, FsError::NotFound { .. }) }
    pub fn is_already_exists(&self) -> bool { matches!(self, FsError::AlreadyExists { .. }) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            FsError::NotFound { .. } => 404,
            FsError::AlreadyExists { .. } => 409,
            FsError::NotEmpty { .. } => 409,
            FsError::InvalidOperation { .. } => 400,
            FsError::Store { .. } => 503,
            FsError::Internal { .. } => 500,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

impl From<StoreError> for FsError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Missing { .. } => FsError::NotFound { code: "entity_missing".into(), message },
            StoreError::Conflict { path } => FsError::AlreadyExists { code: "already_exists".into(), message: format!("Path {} is already in use", path) },
            _ => FsError::Store { code: "store_error".into(), message },
        }
    }
}

impl From<anyhow::Error> for FsError {
    fn from(err: anyhow::Error) -> Self {
        // Collaborator failures (content store) default to Store
        FsError::Store { code: "content_error".into(), message: format!("{:#}", err) }
    }
}

#[cfg(test)]
mod error_tests;

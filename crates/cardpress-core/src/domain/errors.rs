//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid identifier formats.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid remote card identifier
    #[error("Invalid card ID: {0}")]
    InvalidCardId(String),

    /// Invalid upload slot identifier
    #[error("Invalid upload ID: {0}")]
    InvalidUploadId(String),

    /// Invalid content hash format (expected SHA-256 lowercase hex)
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// A credential token was empty or missing
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

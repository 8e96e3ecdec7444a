//! Error types for the Mirror engine.

use thiserror::Error;

/// All possible errors from the Mirror engine.
///
/// Every variant describes a fault in caller-supplied key extraction. These
/// are programming errors, so they are never retried or masked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("missing key field: {0}")]
    MissingKey(String),

    #[error("invalid key in field '{field}': expected string or integer, got {got}")]
    InvalidKey { field: String, got: String },

    #[error("key extraction failed: {0}")]
    KeyExtraction(String),

    /// A snapshot entry whose item does not carry the key it is indexed by.
    #[error("snapshot key {snapshot} does not match item key {extracted}")]
    KeyMismatch { snapshot: String, extracted: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

//! # Error Types
//!
//! Errors raised by the foundational types. Higher crates wrap these into
//! their own `thiserror` enums; every variant maps to an [`ErrorCode`].

use thiserror::Error;

use crate::codes::ErrorCode;

/// Top-level error type for `zkid-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A key fingerprint was not a 64-character hex string.
    #[error("invalid key fingerprint: {0}")]
    InvalidFingerprint(String),

    /// A policy or configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoreError {
    /// Stable operator-facing code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Canonicalization(_) => ErrorCode::ChallengeInvalid,
            Self::InvalidFingerprint(_) => ErrorCode::KeyParse,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

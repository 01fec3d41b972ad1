//! Errors raised by the commitment engine.

use thiserror::Error;
use zkid_core::{CoreError, ErrorCode};

/// Error computing a commitment, binding, or migration.
#[derive(Error, Debug)]
pub enum CommitmentError {
    /// The salt is not valid hex, or is too short for Argon2id.
    #[error("salt decode failed: {0}")]
    SaltDecode(String),

    /// A commitment or other field element string is not canonical decimal.
    #[error("commitment parse failed: {0}")]
    CommitmentParse(String),

    /// Argon2id rejected its parameters.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// The policy's KDF parameters are unusable.
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] CoreError),

    /// The stored commitment does not match the one recomputed from the
    /// presented secret. The secret or salt is wrong.
    #[error("old commitment mismatch: secret or salt may be incorrect")]
    CommitmentMismatch,
}

impl CommitmentError {
    /// Stable operator-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SaltDecode(_) => ErrorCode::SaltParse,
            Self::CommitmentParse(_) => ErrorCode::CommitmentParse,
            Self::Kdf(_) => ErrorCode::BindingCompute,
            Self::InvalidPolicy(e) => e.code(),
            Self::CommitmentMismatch => ErrorCode::CommitmentParse,
        }
    }
}

//! # Authentication Errors
//!
//! Every failure on the login path is an [`AuthError`] whose variant is the
//! kind an integrator branches on: expired challenge, replay, version skew,
//! bad proof. Kinds stay distinct in `Display`, in [`AuthError::code`] and
//! in [`AuthError::kind`] (the metrics label), so operators can tell a
//! stale client from an attack.
//!
//! End users never see the kind. [`AuthError::user_message`] is the same
//! string for every variant, so a failed login leaks nothing about which
//! check fired.

use thiserror::Error;
use zkid_core::{CoreError, ErrorCode};
use zkid_crypto::CommitmentError;
use zkid_zkp::{PolicyError, ProofError, SetupError};

use crate::keys::KeyRegistryError;
use crate::replay::ReplayError;
use crate::token::TokenError;

/// The only message shown to end users.
pub const USER_FACING_FAILURE: &str = "verification failed";

/// A login-path failure.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The caller omitted required fields.
    #[error("missing arguments: {0}")]
    MissingArguments(String),

    /// No signing or verification key is configured.
    #[error("challenge token key missing")]
    TokenKeyMissing,

    /// Token malformed, badly signed, wrong schema, or bound to another key.
    #[error("invalid challenge token: {0}")]
    TokenInvalid(String),

    /// Token `exp` is at or before the validation time.
    #[error("challenge token expired")]
    TokenExpired,

    /// The token's jti was already consumed.
    #[error("challenge token already used (replay detected)")]
    ReplayDetected,

    /// `params_version` disagreement. Recoverable by re-syncing the policy.
    #[error("policy mismatch: expected params_version {expected}, got {presented}")]
    PolicyMismatch { expected: String, presented: String },

    /// `vk_id` disagreement. Stale client or forged envelope.
    #[error("verifying key mismatch: expected {expected}, got {presented}")]
    KeyMismatch { expected: String, presented: String },

    /// The key is unknown to the registry or past its validity window.
    #[error("key version not trusted: {0}")]
    KeyNotTrusted(String),

    /// A salt or commitment is not in its canonical encoding.
    #[error("salt or commitment parse error: {0}")]
    Parse(String),

    /// The backend rejected the proof. Carries no detail by construction.
    #[error("proof verification failed")]
    ProofVerificationFailed,

    /// Client-side proof generation failed.
    #[error(transparent)]
    Proving(#[from] ProofError),

    /// Key setup or key decoding failed.
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Key derivation failed for a reason other than encoding.
    #[error(transparent)]
    Commitment(CommitmentError),

    /// The proof backend is not acceptable under the proof policy.
    #[error(transparent)]
    ProofPolicy(#[from] PolicyError),

    /// Key registry bookkeeping failed.
    #[error(transparent)]
    Registry(#[from] KeyRegistryError),

    /// Configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Stable operator-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingArguments(_) => ErrorCode::MissingArguments,
            Self::TokenKeyMissing => ErrorCode::TokenKeyMissing,
            Self::TokenInvalid(_) => ErrorCode::ChallengeInvalid,
            Self::TokenExpired => ErrorCode::ChallengeExpired,
            Self::ReplayDetected => ErrorCode::ReplayDetected,
            Self::PolicyMismatch { .. } => ErrorCode::PolicyMismatch,
            Self::KeyMismatch { .. } => ErrorCode::KeyMismatch,
            Self::KeyNotTrusted(_) => ErrorCode::KeyRotation,
            Self::Parse(_) => ErrorCode::CommitmentParse,
            Self::ProofVerificationFailed => ErrorCode::VerificationFailed,
            Self::Proving(e) => e.code(),
            Self::Setup(e) => e.code(),
            Self::Commitment(e) => e.code(),
            Self::ProofPolicy(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }

    /// Short snake_case kind, used as the `outcome` metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingArguments(_) => "missing_arguments",
            Self::TokenKeyMissing => "token_key_missing",
            Self::TokenInvalid(_) => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::ReplayDetected => "replay_detected",
            Self::PolicyMismatch { .. } => "policy_mismatch",
            Self::KeyMismatch { .. } => "key_mismatch",
            Self::KeyNotTrusted(_) => "key_not_trusted",
            Self::Parse(_) => "parse_error",
            Self::ProofVerificationFailed => "proof_verification_failed",
            Self::Proving(_) => "proving_failed",
            Self::Setup(_) => "setup_failed",
            Self::Commitment(_) => "commitment_failed",
            Self::ProofPolicy(_) => "proof_policy",
            Self::Registry(_) => "registry",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    /// What an end user is told, whatever the kind.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_FAILURE
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::MissingArguments(what) => Self::MissingArguments(what.to_string()),
            TokenError::KeyMissing => Self::TokenKeyMissing,
            TokenError::Invalid(why) => Self::TokenInvalid(why),
            TokenError::Expired => Self::TokenExpired,
            TokenError::PolicyMismatch { expected, presented } => {
                Self::PolicyMismatch { expected, presented }
            }
        }
    }
}

impl From<ReplayError> for AuthError {
    fn from(e: ReplayError) -> Self {
        match e {
            ReplayError::AlreadyUsed => Self::ReplayDetected,
        }
    }
}

impl From<CommitmentError> for AuthError {
    fn from(e: CommitmentError) -> Self {
        match e {
            CommitmentError::SaltDecode(_) | CommitmentError::CommitmentParse(_) => {
                Self::Parse(e.to_string())
            }
            other => Self::Commitment(other),
        }
    }
}

impl From<CoreError> for AuthError {
    fn from(e: CoreError) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_is_uniform() {
        let errors = [
            AuthError::TokenExpired,
            AuthError::ReplayDetected,
            AuthError::ProofVerificationFailed,
            AuthError::KeyMismatch {
                expected: "a".into(),
                presented: "b".into(),
            },
        ];
        for e in &errors {
            assert_eq!(e.user_message(), "verification failed");
        }
    }

    #[test]
    fn test_codes() {
        assert_eq!(AuthError::ReplayDetected.code().as_str(), "E1013");
        assert_eq!(AuthError::TokenExpired.code().as_str(), "E1011");
        assert_eq!(AuthError::TokenInvalid("x".into()).code().as_str(), "E1012");
        assert_eq!(AuthError::TokenKeyMissing.code().as_str(), "E4004");
        assert_eq!(
            AuthError::PolicyMismatch {
                expected: "a".into(),
                presented: "b".into()
            }
            .code()
            .as_str(),
            "E4002"
        );
        assert_eq!(AuthError::ProofVerificationFailed.code().as_str(), "E1003");
    }

    #[test]
    fn test_token_error_mapping_keeps_kind() {
        let e: AuthError = TokenError::Expired.into();
        assert!(matches!(e, AuthError::TokenExpired));
        let e: AuthError = TokenError::MissingArguments("user_id").into();
        assert!(matches!(e, AuthError::MissingArguments(_)));
        let e: AuthError = ReplayError::AlreadyUsed.into();
        assert_eq!(e.kind(), "replay_detected");
    }

    #[test]
    fn test_commitment_parse_maps_to_parse_kind() {
        let e: AuthError = CommitmentError::SaltDecode("bad".into()).into();
        assert!(matches!(e, AuthError::Parse(_)));
        let e: AuthError = CommitmentError::Kdf("bad".into()).into();
        assert!(matches!(e, AuthError::Commitment(_)));
    }

    #[test]
    fn test_verification_failure_has_no_detail() {
        assert_eq!(
            AuthError::ProofVerificationFailed.to_string(),
            "proof verification failed"
        );
    }
}

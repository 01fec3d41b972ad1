//! # Proof Backend Policy
//!
//! Decides whether a proof backend may be used to admit logins.
//!
//! The transparent reference backend ([`TransparentProofSystem`]) checks
//! the statement but is not zero-knowledge and not sound against anyone
//! holding the verifying key: its "proofs" are MACs under a seed embedded
//! in both keys. A verifier that accepts them in production can be fed
//! proofs without the underlying witness.
//!
//! In `Production` mode only zero-knowledge backends are accepted. The mode
//! is determined by:
//! 1. explicit construction ([`ProofPolicy::new`]),
//! 2. the `ZKID_PROOF_POLICY` environment variable,
//! 3. the build profile: release builds default to `Production`, debug
//!    builds to `Development`.
//!
//! [`TransparentProofSystem`]: crate::transparent::TransparentProofSystem

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zkid_core::ErrorCode;

/// Environment variable that overrides the build-profile default.
pub const PROOF_POLICY_ENV: &str = "ZKID_PROOF_POLICY";

/// Errors from proof policy enforcement.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Backend rejected in production mode.
    #[error("proof backend rejected: production mode requires a zero-knowledge backend ({backend})")]
    BackendRejected {
        /// The backend that was rejected.
        backend: String,
    },

    /// Unrecognised policy mode string.
    #[error("unknown proof policy {0:?}: expected \"production\" or \"development\"")]
    UnknownMode(String),
}

impl PolicyError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::InvalidConfig
    }
}

/// The kind of proof backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofBackend {
    /// MAC-based reference backend. Checks the statement, hides nothing.
    Transparent,
    /// Groth16 SNARK.
    Groth16,
    /// PLONK.
    Plonk,
}

impl ProofBackend {
    /// Whether proofs from this backend reveal nothing beyond the statement.
    pub fn is_zero_knowledge(self) -> bool {
        matches!(self, ProofBackend::Groth16 | ProofBackend::Plonk)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ProofBackend::Transparent => "transparent-hmac",
            ProofBackend::Groth16 => "groth16",
            ProofBackend::Plonk => "plonk",
        }
    }
}

/// Proof policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Reject backends without zero-knowledge soundness.
    Production,
    /// Accept any backend (testing and local development only).
    Development,
}

impl std::str::FromStr for PolicyMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(PolicyError::UnknownMode(other.to_string())),
        }
    }
}

impl PolicyMode {
    /// Build-profile default: release is production, debug is development.
    pub fn build_default() -> Self {
        if cfg!(not(debug_assertions)) {
            Self::Production
        } else {
            Self::Development
        }
    }
}

/// Runtime gate over proof backends.
///
/// ```rust
/// use zkid_zkp::policy::{ProofBackend, ProofPolicy};
///
/// let policy = ProofPolicy::production();
/// assert!(policy.validate(ProofBackend::Groth16).is_ok());
/// assert!(policy.validate(ProofBackend::Transparent).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofPolicy {
    mode: PolicyMode,
}

impl ProofPolicy {
    pub fn new(mode: PolicyMode) -> Self {
        Self { mode }
    }

    pub fn production() -> Self {
        Self::new(PolicyMode::Production)
    }

    pub fn development() -> Self {
        Self::new(PolicyMode::Development)
    }

    /// Policy from an optional override string, else the build default.
    /// An unrecognised override is an error, never a silent default.
    pub fn from_override(value: Option<&str>) -> Result<Self, PolicyError> {
        match value {
            Some(v) => Ok(Self::new(v.parse()?)),
            None => Ok(Self::new(PolicyMode::build_default())),
        }
    }

    /// Policy from `ZKID_PROOF_POLICY`, else the build default.
    pub fn from_environment() -> Result<Self, PolicyError> {
        let value = std::env::var(PROOF_POLICY_ENV).ok();
        Self::from_override(value.as_deref())
    }

    /// Whether `backend` is acceptable under this policy.
    pub fn validate(&self, backend: ProofBackend) -> Result<(), PolicyError> {
        match self.mode {
            PolicyMode::Production if !backend.is_zero_knowledge() => {
                Err(PolicyError::BackendRejected {
                    backend: backend.name().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }
}

impl Default for ProofPolicy {
    fn default() -> Self {
        Self::new(PolicyMode::build_default())
    }
}

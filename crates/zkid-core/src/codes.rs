//! # Structured Error Codes
//!
//! Every error kind surfaced by zkid carries a stable code of the form
//! `EXXXX` so that integrators can map failures to HTTP statuses, log
//! levels and alerts without matching on message text.
//!
//! | Range   | Category                  |
//! |---------|---------------------------|
//! | `E1xxx` | Authentication            |
//! | `E2xxx` | Keys and setup            |
//! | `E4xxx` | Configuration and policy  |

use serde::{Deserialize, Serialize};

/// Stable operator-facing error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Proof bytes are not in the backend's format.
    ProofFormat,
    /// A commitment string could not be parsed into a field element.
    CommitmentParse,
    /// The proof backend rejected the proof.
    VerificationFailed,
    /// Salt is not valid hex.
    SaltParse,
    /// Binding could not be computed.
    BindingCompute,
    /// The witness does not satisfy the circuit.
    WitnessCreate,
    /// Proof generation failed inside the backend.
    ProofGeneration,
    /// Circuit compilation failed.
    CircuitCompile,
    /// Required arguments were omitted.
    MissingArguments,
    /// Challenge token has expired.
    ChallengeExpired,
    /// Challenge token is malformed, badly signed, or of the wrong schema.
    ChallengeInvalid,
    /// Challenge token was already consumed.
    ReplayDetected,
    /// A key could not be parsed.
    KeyParse,
    /// Verifying key fingerprint disagreement.
    KeyMismatch,
    /// Key generation failed.
    SetupFailed,
    /// The presented key version is unknown or past its validity window.
    KeyRotation,
    /// Client/server policy parameters disagree.
    PolicyMismatch,
    /// A configuration value is invalid.
    InvalidConfig,
    /// No challenge token key is configured.
    TokenKeyMissing,
}

impl ErrorCode {
    /// The `EXXXX` code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProofFormat => "E1001",
            Self::CommitmentParse => "E1002",
            Self::VerificationFailed => "E1003",
            Self::SaltParse => "E1005",
            Self::BindingCompute => "E1006",
            Self::WitnessCreate => "E1007",
            Self::ProofGeneration => "E1008",
            Self::CircuitCompile => "E1009",
            Self::MissingArguments => "E1010",
            Self::ChallengeExpired => "E1011",
            Self::ChallengeInvalid => "E1012",
            Self::ReplayDetected => "E1013",
            Self::KeyParse => "E2001",
            Self::KeyMismatch => "E2004",
            Self::SetupFailed => "E2005",
            Self::KeyRotation => "E2006",
            Self::PolicyMismatch => "E4002",
            Self::InvalidConfig => "E4003",
            Self::TokenKeyMissing => "E4004",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

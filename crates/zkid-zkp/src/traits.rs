//! # Proof System Trait
//!
//! The call contract zkid consumes from a zero-knowledge backend:
//!
//! ```text
//!   compile(circuit)          -> CompiledCircuit
//!   setup(compiled)           -> (ProvingKey, VerifyingKey)
//!   prove(pk, public, witness)-> proof bytes     | ProofError
//!   verify(vk, public, proof) -> ()              | VerifyError
//! ```
//!
//! The rest of the workspace never inspects proof bytes. Keys are
//! identified by the SHA-256 fingerprint of their encoding
//! ([`ProofKey::fingerprint`]), which becomes the `pk_id` / `vk_id`.
//!
//! The trait is open: a deployment plugs in its own backend. The
//! [`ProofPolicy`](crate::policy::ProofPolicy) gate decides whether a given
//! backend is acceptable for the current deployment.

use sha2::{Digest, Sha256};
use thiserror::Error;
use zkid_core::{ErrorCode, KeyFingerprint};

use crate::circuits::{CircuitKind, PublicInputs, Witness};
use crate::policy::ProofBackend;

/// Error during circuit compilation or key generation.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The circuit could not be compiled.
    #[error("circuit compilation failed: {0}")]
    Compile(String),
    /// Key generation failed.
    #[error("key setup failed: {0}")]
    Setup(String),
    /// A serialized key could not be decoded.
    #[error("key parse failed: {0}")]
    KeyParse(String),
}

impl SetupError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Compile(_) => ErrorCode::CircuitCompile,
            Self::Setup(_) => ErrorCode::SetupFailed,
            Self::KeyParse(_) => ErrorCode::KeyParse,
        }
    }
}

/// Error during proof generation.
#[derive(Error, Debug)]
pub enum ProofError {
    /// The witness does not satisfy the circuit, or belongs to another one.
    #[error("invalid witness: {0}")]
    Witness(String),
    /// Proof generation failed internally.
    #[error("proof generation failed: {0}")]
    Proving(String),
}

impl ProofError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Witness(_) => ErrorCode::WitnessCreate,
            Self::Proving(_) => ErrorCode::ProofGeneration,
        }
    }
}

/// Error during proof verification.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The proof is structurally malformed.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// The proof does not verify against the public inputs.
    #[error("proof verification failed")]
    VerificationFailed,
}

impl VerifyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedProof(_) => ErrorCode::ProofFormat,
            Self::VerificationFailed => ErrorCode::VerificationFailed,
        }
    }
}

/// A compiled circuit: its kind plus a digest of the constraint system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledCircuit {
    pub kind: CircuitKind,
    pub digest: [u8; 32],
}

impl CompiledCircuit {
    /// Compile by digesting the circuit statement.
    pub fn from_statement(kind: CircuitKind) -> Self {
        Self {
            kind,
            digest: Sha256::digest(kind.statement().as_bytes()).into(),
        }
    }
}

/// A proving or verifying key.
pub trait ProofKey: Sized {
    /// The circuit this key was generated for.
    fn circuit(&self) -> CircuitKind;

    /// Stable encoding of the key.
    fn to_bytes(&self) -> Vec<u8>;

    /// Decode a key previously produced by [`to_bytes`](Self::to_bytes).
    fn from_bytes(bytes: &[u8]) -> Result<Self, SetupError>;

    /// Content fingerprint: SHA-256 over [`to_bytes`](Self::to_bytes).
    fn fingerprint(&self) -> KeyFingerprint {
        KeyFingerprint::of_bytes(&self.to_bytes())
    }
}

/// A zero-knowledge proof system.
///
/// Requires `Send + Sync` so one instance can serve concurrent logins.
pub trait ProofSystem: Send + Sync {
    /// The proving key type.
    type ProvingKey: ProofKey + Send + Sync;
    /// The verifying key type.
    type VerifyingKey: ProofKey + Clone + Send + Sync;

    /// Which backend this is, for the proof policy gate.
    fn backend(&self) -> ProofBackend;

    /// Compile a circuit.
    fn compile(&self, kind: CircuitKind) -> Result<CompiledCircuit, SetupError>;

    /// Generate a keypair for a compiled circuit.
    fn setup(
        &self,
        circuit: &CompiledCircuit,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey), SetupError>;

    /// Prove that `witness` satisfies the circuit for `public`.
    ///
    /// # Errors
    ///
    /// [`ProofError::Witness`] if the assignment is unsatisfiable or does
    /// not match the key's circuit; [`ProofError::Proving`] on internal
    /// failure.
    fn prove(
        &self,
        pk: &Self::ProvingKey,
        public: &PublicInputs,
        witness: &Witness,
    ) -> Result<Vec<u8>, ProofError>;

    /// Verify a proof against public inputs.
    ///
    /// # Errors
    ///
    /// [`VerifyError::MalformedProof`] if the bytes are structurally
    /// invalid; [`VerifyError::VerificationFailed`] otherwise.
    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        public: &PublicInputs,
        proof: &[u8],
    ) -> Result<(), VerifyError>;
}

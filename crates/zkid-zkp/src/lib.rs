//! # zkid-zkp — Proof Backend Contract
//!
//! zkid treats the zero-knowledge prover as an external collaborator. This
//! crate pins down what it needs from one:
//!
//! - [`ProofSystem`]: compile / setup / prove / verify, with keys
//!   identified by content fingerprint.
//! - [`circuits`]: the two statements (login and age-only): their public
//!   inputs, private witness, and native constraint check.
//! - [`TransparentProofSystem`]: a reference backend that enforces the
//!   statement but is not zero-knowledge. Used in tests and development.
//! - [`ProofPolicy`]: refuses non-zero-knowledge backends in production.
//! - [`ProofResult`]: the envelope a client submits.
//!
//! Nothing outside a backend ever inspects proof bytes.

pub mod circuits;
pub mod envelope;
pub mod policy;
pub mod traits;
pub mod transparent;

pub use circuits::{
    AgePublicInputs, AgeWitness, AuthPublicInputs, AuthWitness, CircuitKind, PublicInputs,
    Witness, AGE_PROOF_VERSION, AUTH_PROOF_VERSION,
};
pub use envelope::ProofResult;
pub use policy::{PolicyError, PolicyMode, ProofBackend, ProofPolicy};
pub use traits::{CompiledCircuit, ProofError, ProofKey, ProofSystem, SetupError, VerifyError};
pub use transparent::{TransparentProofSystem, TransparentProvingKey, TransparentVerifyingKey};

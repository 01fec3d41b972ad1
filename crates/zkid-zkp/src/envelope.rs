//! # Proof Result Envelope
//!
//! The transfer object a client submits after proving. It is never stored.
//! `proof_version` distinguishes the login and age-only circuits without
//! looking at the proof bytes; `vk_id` and `params_version` are what the
//! Policy Binder compares against the server's bundle before any
//! verification work.
//!
//! Wire form:
//!
//! ```json
//! {
//!   "proof": "01ab...",
//!   "proof_version": "auth-proof-v1",
//!   "vk_id": "<64 hex>",
//!   "params_version": "<64 hex>",
//!   "commitment": "<decimal>",
//!   "salt": "<hex>"
//! }
//! ```
//!
//! `commitment` and `salt` are omitted for age-only proofs. They are kept
//! as strings so a malformed value surfaces as a parse error at the point
//! of use rather than as an opaque deserialization failure.

use serde::{Deserialize, Serialize};

use crate::circuits::CircuitKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResult {
    /// Backend-defined proof bytes, hex on the wire.
    #[serde(with = "hex")]
    pub proof: Vec<u8>,
    pub proof_version: String,
    pub vk_id: String,
    pub params_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl ProofResult {
    /// The circuit named by `proof_version`, if recognised.
    pub fn circuit(&self) -> Option<CircuitKind> {
        CircuitKind::from_proof_version(&self.proof_version)
    }
}

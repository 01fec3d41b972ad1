//! # Commitment, Binding, Registration
//!
//! `derive` and `commit` take the salt as hex, the form it is stored and
//! transmitted in. Every function here is deterministic in its inputs; the
//! only randomness is the fresh salt drawn by [`create_commitment`].

use serde::{Deserialize, Serialize};
use zkid_core::SharedPolicy;

use crate::error::CommitmentError;
use crate::field::FieldElement;
use crate::kdf::argon2id;
use crate::mimc;
use crate::salt::Salt;

/// A stored commitment: the public value and the salt it was made with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// `MiMC(derived, F(salt))`, canonical decimal on the wire.
    pub value: FieldElement,
    /// The per-user salt, hex on the wire.
    pub salt: Salt,
}

/// Run Argon2id over `(secret, salt)` under the policy's KDF cost and map
/// the output into the field.
pub fn derive(
    secret: &[u8],
    salt_hex: &str,
    policy: &SharedPolicy,
) -> Result<FieldElement, CommitmentError> {
    let salt = Salt::from_hex(salt_hex)?;
    derive_with_salt(secret, &salt, policy)
}

pub(crate) fn derive_with_salt(
    secret: &[u8],
    salt: &Salt,
    policy: &SharedPolicy,
) -> Result<FieldElement, CommitmentError> {
    let key = argon2id(secret, salt.as_bytes(), policy.kdf())?;
    Ok(FieldElement::from_be_bytes_mod_order(&key[..]))
}

/// `MiMC(derive(secret, salt), F(salt))`.
pub fn commit(
    secret: &[u8],
    salt_hex: &str,
    policy: &SharedPolicy,
) -> Result<FieldElement, CommitmentError> {
    let salt = Salt::from_hex(salt_hex)?;
    commit_with_salt(secret, &salt, policy)
}

pub(crate) fn commit_with_salt(
    secret: &[u8],
    salt: &Salt,
    policy: &SharedPolicy,
) -> Result<FieldElement, CommitmentError> {
    let derived = derive_with_salt(secret, salt, policy)?;
    Ok(commit_derived(derived, salt))
}

/// Commitment from an already-derived key. This is the relation the circuit
/// checks: `MiMC(derived, F(salt)) == commitment`.
pub fn commit_derived(derived: FieldElement, salt: &Salt) -> FieldElement {
    mimc::hash2(derived, salt.to_field())
}

/// `MiMC(commitment, challenge)`.
pub fn bind(commitment: &FieldElement, challenge: u64) -> FieldElement {
    mimc::hash2(*commitment, FieldElement::from_u64(challenge))
}

/// Registration: draw a fresh salt and commit to `secret` under `policy`.
pub fn create_commitment(
    secret: &[u8],
    policy: &SharedPolicy,
) -> Result<Commitment, CommitmentError> {
    let salt = Salt::generate();
    let value = commit_with_salt(secret, &salt, policy)?;
    Ok(Commitment { value, salt })
}

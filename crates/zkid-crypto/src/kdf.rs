//! # Argon2id Key Derivation
//!
//! The memory-hard step between a user secret and its commitment. Cost is
//! governed by the policy's `argon_memory` / `argon_iterations`; lanes and
//! output length are fixed workspace constants so they can never drift
//! between client and server.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;
use zkid_core::policy::{ARGON_KEY_LEN, ARGON_THREADS};
use zkid_core::KdfParams;

use crate::error::CommitmentError;

/// Run Argon2id over `(secret, salt)` and return the 32-byte output.
///
/// The output is wrapped in `Zeroizing` so it is wiped when dropped.
pub fn argon2id(
    secret: &[u8],
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<[u8; ARGON_KEY_LEN]>, CommitmentError> {
    params.validate()?;
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        ARGON_THREADS,
        Some(ARGON_KEY_LEN),
    )
    .map_err(|e| CommitmentError::Kdf(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut out = Zeroizing::new([0u8; ARGON_KEY_LEN]);
    argon
        .hash_password_into(secret, salt, &mut out[..])
        .map_err(|e| CommitmentError::Kdf(e.to_string()))?;
    Ok(out)
}

//! # Shared Policy and the Policy Binder
//!
//! [`SharedPolicy`] holds the parameters that client and server must agree
//! on exactly: the age policy (`target_year`, `limit_age`) that is a public
//! input to every proof, and the Argon2id cost (`argon_memory`,
//! `argon_iterations`) that determines the commitment.
//!
//! [`params_version()`] fingerprints a policy: SHA-256 over the textual
//! encoding `"{target_year}-{limit_age}-{argon_memory}-{argon_iterations}"`,
//! hex encoded. Changing any field changes the fingerprint, so version skew
//! is detected by a single string comparison before any proof work is done.
//!
//! Changing KDF parameters changes every stored commitment; migrate
//! commitments and regenerate keys together.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Default reference year for the age policy.
pub const DEFAULT_TARGET_YEAR: i32 = 2025;
/// Default minimum age.
pub const DEFAULT_LIMIT_AGE: i32 = 20;
/// Default Argon2id memory cost in KiB (64 MiB).
pub const DEFAULT_ARGON_MEMORY_KIB: u32 = 64 * 1024;
/// Default Argon2id iteration count.
pub const DEFAULT_ARGON_ITERATIONS: u32 = 3;
/// Argon2id lanes. Fixed; not part of the policy fingerprint.
pub const ARGON_THREADS: u32 = 4;
/// Argon2id output length in bytes.
pub const ARGON_KEY_LEN: usize = 32;
/// Argon2 requires at least 8 KiB of memory per lane.
pub const MIN_ARGON_MEMORY_KIB: u32 = 8 * ARGON_THREADS;

/// Memory-hard KDF cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
}

impl KdfParams {
    /// Reject parameters Argon2id cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.iterations == 0 {
            return Err(CoreError::InvalidConfig(
                "argon_iterations must be at least 1".into(),
            ));
        }
        if self.memory_kib < MIN_ARGON_MEMORY_KIB {
            return Err(CoreError::InvalidConfig(format!(
                "argon_memory must be at least {MIN_ARGON_MEMORY_KIB} KiB, got {}",
                self.memory_kib
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_ARGON_MEMORY_KIB,
            iterations: DEFAULT_ARGON_ITERATIONS,
        }
    }
}

/// Immutable policy snapshot shared by client and server.
///
/// Field names on the wire match the policy bundle: `target_year`,
/// `limit_age`, `argon_memory`, `argon_iterations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedPolicy {
    /// Reference year the age inequality is evaluated against.
    pub target_year: i32,
    /// Minimum age: `target_year - birth_year >= limit_age`.
    pub limit_age: i32,
    /// Argon2id memory cost in KiB.
    #[serde(rename = "argon_memory")]
    pub kdf_memory_kib: u32,
    /// Argon2id iteration count.
    #[serde(rename = "argon_iterations")]
    pub kdf_iterations: u32,
}

impl SharedPolicy {
    /// The KDF half of the policy.
    pub fn kdf(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
        }
    }

    /// Copy of this policy with different KDF parameters.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf_memory_kib = kdf.memory_kib;
        self.kdf_iterations = kdf.iterations;
        self
    }

    /// Validate that the policy is usable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.limit_age < 0 {
            return Err(CoreError::InvalidConfig(format!(
                "limit_age must be non-negative, got {}",
                self.limit_age
            )));
        }
        if self.target_year <= 0 {
            return Err(CoreError::InvalidConfig(format!(
                "target_year must be positive, got {}",
                self.target_year
            )));
        }
        self.kdf().validate()
    }

    /// The Policy Binder fingerprint of this policy.
    pub fn params_version(&self) -> String {
        params_version(self)
    }
}

impl Default for SharedPolicy {
    fn default() -> Self {
        Self {
            target_year: DEFAULT_TARGET_YEAR,
            limit_age: DEFAULT_LIMIT_AGE,
            kdf_memory_kib: DEFAULT_ARGON_MEMORY_KIB,
            kdf_iterations: DEFAULT_ARGON_ITERATIONS,
        }
    }
}

/// Stable fingerprint of a policy.
///
/// Deterministic across processes and platforms: the input is a fixed
/// textual encoding, not a serializer-dependent byte layout.
pub fn params_version(policy: &SharedPolicy) -> String {
    let payload = format!(
        "{}-{}-{}-{}",
        policy.target_year, policy.limit_age, policy.kdf_memory_kib, policy.kdf_iterations
    );
    hex::encode(Sha256::digest(payload.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let p = SharedPolicy::default();
        assert_eq!(p.target_year, 2025);
        assert_eq!(p.limit_age, 20);
        assert_eq!(p.kdf_memory_kib, 65536);
        assert_eq!(p.kdf_iterations, 3);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_params_version_is_stable() {
        let p = SharedPolicy::default();
        assert_eq!(params_version(&p), params_version(&p));
        assert_eq!(params_version(&p).len(), 64);
        // SHA-256("2025-20-65536-3")
        assert_eq!(params_version(&p), hex::encode(Sha256::digest(b"2025-20-65536-3")));
    }

    #[test]
    fn test_every_field_changes_fingerprint() {
        let base = SharedPolicy::default();
        let fp = base.params_version();
        let variants = [
            SharedPolicy { target_year: 2026, ..base },
            SharedPolicy { limit_age: 19, ..base },
            SharedPolicy { kdf_memory_kib: 32 * 1024, ..base },
            SharedPolicy { kdf_iterations: 1, ..base },
        ];
        for v in variants {
            assert_ne!(v.params_version(), fp, "{v:?} should change the fingerprint");
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(SharedPolicy::default()).unwrap();
        assert_eq!(json["target_year"], 2025);
        assert_eq!(json["limit_age"], 20);
        assert_eq!(json["argon_memory"], 65536);
        assert_eq!(json["argon_iterations"], 3);
    }

    #[test]
    fn test_validate_rejects_bad_kdf() {
        let zero_iter = SharedPolicy { kdf_iterations: 0, ..SharedPolicy::default() };
        assert!(zero_iter.validate().is_err());
        let tiny_mem = SharedPolicy { kdf_memory_kib: 8, ..SharedPolicy::default() };
        assert!(tiny_mem.validate().is_err());
        let negative_age = SharedPolicy { limit_age: -1, ..SharedPolicy::default() };
        assert!(negative_age.validate().is_err());
    }

    #[test]
    fn test_with_kdf() {
        let p = SharedPolicy::default().with_kdf(KdfParams { memory_kib: 1024, iterations: 1 });
        assert_eq!(p.kdf(), KdfParams { memory_kib: 1024, iterations: 1 });
        assert_eq!(p.target_year, 2025);
    }
}

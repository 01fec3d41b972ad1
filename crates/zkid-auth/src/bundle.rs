//! # Policy Bundle
//!
//! The snapshot a server hands clients so both sides derive commitments
//! and build public inputs from the same parameters:
//!
//! ```json
//! { "config": { "target_year": 2025, "limit_age": 20,
//!               "argon_memory": 65536, "argon_iterations": 3 },
//!   "params_version": "<64 hex>", "vk_id": "<64 hex>" }
//! ```
//!
//! [`enforce_policy`] compares what a client presents against the bundle.
//! It is a pure string comparison and runs before any cryptographic work,
//! so version skew is rejected cheaply.

use serde::{Deserialize, Serialize};
use zkid_core::{KeyFingerprint, SharedPolicy};

use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBundle {
    pub config: SharedPolicy,
    pub params_version: String,
    pub vk_id: String,
}

impl PolicyBundle {
    /// Bundle for `policy` and the verifying key `vk_id`, with the
    /// fingerprint computed from the policy.
    pub fn for_policy(policy: SharedPolicy, vk_id: &KeyFingerprint) -> Self {
        Self {
            params_version: policy.params_version(),
            config: policy,
            vk_id: vk_id.to_hex(),
        }
    }

    /// True if `params_version` is the fingerprint of `config`.
    pub fn is_consistent(&self) -> bool {
        self.params_version == self.config.params_version()
    }
}

/// Check a presented `vk_id` and `params_version` against `bundle`.
///
/// The key is checked first. An empty presented value is not checked.
pub fn enforce_policy(
    bundle: &PolicyBundle,
    presented_vk_id: &str,
    presented_params_version: &str,
) -> Result<(), AuthError> {
    if !presented_vk_id.is_empty() && presented_vk_id != bundle.vk_id {
        return Err(AuthError::KeyMismatch {
            expected: bundle.vk_id.clone(),
            presented: presented_vk_id.to_string(),
        });
    }
    if !presented_params_version.is_empty() && presented_params_version != bundle.params_version {
        return Err(AuthError::PolicyMismatch {
            expected: bundle.params_version.clone(),
            presented: presented_params_version.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> PolicyBundle {
        PolicyBundle::for_policy(SharedPolicy::default(), &KeyFingerprint::of_bytes(b"vk"))
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(bundle()).unwrap();
        assert_eq!(json["config"]["target_year"], 2025);
        assert_eq!(json["config"]["limit_age"], 20);
        assert_eq!(json["config"]["argon_memory"], 65536);
        assert_eq!(json["config"]["argon_iterations"], 3);
        assert_eq!(json["vk_id"].as_str().unwrap().len(), 64);
        assert!(bundle().is_consistent());
    }

    #[test]
    fn test_enforce_matching_and_empty() {
        let b = bundle();
        assert!(enforce_policy(&b, &b.vk_id, &b.params_version).is_ok());
        assert!(enforce_policy(&b, "", "").is_ok());
        assert!(enforce_policy(&b, &b.vk_id, "").is_ok());
    }

    #[test]
    fn test_enforce_key_mismatch() {
        let b = bundle();
        let err = enforce_policy(&b, "other", &b.params_version).unwrap_err();
        assert!(matches!(err, AuthError::KeyMismatch { .. }));
    }

    #[test]
    fn test_enforce_policy_mismatch() {
        let b = bundle();
        let err = enforce_policy(&b, "", "stale").unwrap_err();
        assert!(matches!(err, AuthError::PolicyMismatch { .. }));
    }

    #[test]
    fn test_key_checked_before_policy() {
        let b = bundle();
        let err = enforce_policy(&b, "other", "stale").unwrap_err();
        assert!(matches!(err, AuthError::KeyMismatch { .. }));
    }

    #[test]
    fn test_any_policy_drift_changes_fingerprint() {
        let base = SharedPolicy::default();
        let variants = [
            SharedPolicy { target_year: 2026, ..base },
            SharedPolicy { limit_age: 21, ..base },
            SharedPolicy { kdf_memory_kib: 32768, ..base },
            SharedPolicy { kdf_iterations: 1, ..base },
        ];
        for v in variants {
            assert_ne!(v.params_version(), base.params_version());
        }
    }
}

//! # Authentication Configuration
//!
//! [`AuthConfig`] deserializes from YAML or JSON (every field has a
//! default) and can be overlaid from the environment:
//!
//! | Variable                  | Field                              |
//! |---------------------------|------------------------------------|
//! | `ZKID_TARGET_YEAR`        | `policy.target_year`               |
//! | `ZKID_LIMIT_AGE`          | `policy.limit_age`                 |
//! | `ZKID_ARGON_MEMORY_KIB`   | `policy.argon_memory`              |
//! | `ZKID_ARGON_ITERATIONS`   | `policy.argon_iterations`          |
//! | `ZKID_CHALLENGE_TTL_SECS` | `challenge_ttl_secs`               |
//! | `ZKID_REPLAY_PROTECTION`  | `replay` (`memory` / `disabled`)   |
//! | `ZKID_REPLAY_CLEANUP_SECS`| `replay_cleanup_interval_secs`     |
//! | `ZKID_KEY_GRACE_DAYS`     | `rotation.grace_period_secs`       |
//! | `ZKID_PROOF_POLICY`       | `proof_policy`                     |
//!
//! A value that does not parse is an error. It is never replaced by the
//! default.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zkid_core::SharedPolicy;
use zkid_zkp::{PolicyMode, ProofPolicy};

use crate::error::AuthError;
use crate::keys::MemoryKeyRegistry;
use crate::replay::{self, ReplayProtection, TokenStore};
use crate::rotation::RotationConfig;
use crate::token::{ChallengeTokenService, TokenKeySet};

pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 120;
pub const DEFAULT_REPLAY_CLEANUP_SECS: u64 = 300;

const SECS_PER_DAY: u64 = 86_400;
/// Ten years.
const MAX_GRACE_PERIOD_SECS: u64 = 3650 * SECS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub policy: SharedPolicy,
    pub challenge_ttl_secs: u64,
    pub replay: ReplayProtection,
    pub replay_cleanup_interval_secs: u64,
    pub rotation: RotationConfig,
    pub proof_policy: PolicyMode,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            policy: SharedPolicy::default(),
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            replay: ReplayProtection::default(),
            replay_cleanup_interval_secs: DEFAULT_REPLAY_CLEANUP_SECS,
            rotation: RotationConfig::default(),
            proof_policy: PolicyMode::build_default(),
        }
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, AuthError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AuthError::InvalidConfig(format!("{name}={raw:?}: {e}")))
}

impl AuthConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (variable name to value) on top of
    /// `self`, then validate.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ZKID_TARGET_YEAR") {
            self.policy.target_year = parse_var("ZKID_TARGET_YEAR", &v)?;
        }
        if let Some(v) = lookup("ZKID_LIMIT_AGE") {
            self.policy.limit_age = parse_var("ZKID_LIMIT_AGE", &v)?;
        }
        if let Some(v) = lookup("ZKID_ARGON_MEMORY_KIB") {
            self.policy.kdf_memory_kib = parse_var("ZKID_ARGON_MEMORY_KIB", &v)?;
        }
        if let Some(v) = lookup("ZKID_ARGON_ITERATIONS") {
            self.policy.kdf_iterations = parse_var("ZKID_ARGON_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("ZKID_CHALLENGE_TTL_SECS") {
            self.challenge_ttl_secs = parse_var("ZKID_CHALLENGE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("ZKID_REPLAY_PROTECTION") {
            self.replay = parse_var("ZKID_REPLAY_PROTECTION", &v)?;
        }
        if let Some(v) = lookup("ZKID_REPLAY_CLEANUP_SECS") {
            self.replay_cleanup_interval_secs = parse_var("ZKID_REPLAY_CLEANUP_SECS", &v)?;
        }
        if let Some(v) = lookup("ZKID_KEY_GRACE_DAYS") {
            let days: u64 = parse_var("ZKID_KEY_GRACE_DAYS", &v)?;
            self.rotation.grace_period_secs = days.saturating_mul(SECS_PER_DAY);
        }
        if let Some(v) = lookup(zkid_zkp::policy::PROOF_POLICY_ENV) {
            self.proof_policy = parse_var(zkid_zkp::policy::PROOF_POLICY_ENV, &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        self.policy.validate()?;
        if self.challenge_ttl_secs == 0 {
            return Err(AuthError::InvalidConfig("challenge_ttl_secs must be positive".into()));
        }
        if self.replay_cleanup_interval_secs == 0 {
            return Err(AuthError::InvalidConfig(
                "replay_cleanup_interval_secs must be positive".into(),
            ));
        }
        if self.rotation.check_interval_secs == 0 {
            return Err(AuthError::InvalidConfig(
                "rotation.check_interval_secs must be positive".into(),
            ));
        }
        if self.rotation.grace_period_secs > MAX_GRACE_PERIOD_SECS {
            return Err(AuthError::InvalidConfig(format!(
                "rotation.grace_period_secs exceeds {MAX_GRACE_PERIOD_SECS}"
            )));
        }
        Ok(())
    }

    pub fn proof_policy(&self) -> ProofPolicy {
        ProofPolicy::new(self.proof_policy)
    }

    pub fn replay_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.replay_cleanup_interval_secs)
    }

    /// Replay store for the configured mode.
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        replay::token_store(self.replay)
    }

    /// Token service over `keys`, this policy and TTL, recording consumed
    /// tokens in `store`.
    pub fn token_service(
        &self,
        keys: TokenKeySet,
        store: Arc<dyn TokenStore>,
    ) -> Result<ChallengeTokenService, AuthError> {
        ChallengeTokenService::new(keys, &self.policy, self.challenge_ttl_secs, store)
    }

    /// Empty key registry with the configured grace period.
    pub fn key_registry(&self) -> MemoryKeyRegistry {
        MemoryKeyRegistry::new().with_grace_period(self.rotation.grace_period())
    }
}

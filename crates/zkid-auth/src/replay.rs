//! # Replay Guard
//!
//! Records consumed challenge-token ids so each token authenticates at most
//! once. A [`TokenStore`] maps `jti` to the token's expiry; entries past
//! expiry are reclaimed by [`TokenStore::cleanup`], which is safe because
//! an expired token is rejected before it ever reaches the store.
//!
//! `store` is an atomic check-and-insert: of N concurrent redemptions of
//! the same `jti`, exactly one succeeds.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::PeriodicTask;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayError {
    #[error("token already used")]
    AlreadyUsed,
}

/// Storage for consumed token ids.
pub trait TokenStore: Send + Sync {
    /// Record `jti` as used until `expires_at` (unix seconds). Fails with
    /// [`ReplayError::AlreadyUsed`] if it is already present.
    fn store(&self, jti: &str, expires_at: i64) -> Result<(), ReplayError>;

    fn exists(&self, jti: &str) -> bool;

    /// Drop entries whose expiry is before `now`. Returns how many.
    fn cleanup(&self, now: i64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    used: RwLock<HashMap<String, i64>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn store(&self, jti: &str, expires_at: i64) -> Result<(), ReplayError> {
        match self.used.write().entry(jti.to_string()) {
            Entry::Occupied(_) => Err(ReplayError::AlreadyUsed),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(())
            }
        }
    }

    fn exists(&self, jti: &str) -> bool {
        self.used.read().contains_key(jti)
    }

    fn cleanup(&self, now: i64) -> usize {
        let mut used = self.used.write();
        let before = used.len();
        used.retain(|_, exp| *exp >= now);
        before - used.len()
    }

    fn len(&self) -> usize {
        self.used.read().len()
    }
}

/// Accepts everything and remembers nothing. Only for deployments that
/// enforce single use elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTokenStore;

impl TokenStore for NoopTokenStore {
    fn store(&self, _jti: &str, _expires_at: i64) -> Result<(), ReplayError> {
        Ok(())
    }

    fn exists(&self, _jti: &str) -> bool {
        false
    }

    fn cleanup(&self, _now: i64) -> usize {
        0
    }

    fn len(&self) -> usize {
        0
    }
}

/// Replay protection mode, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayProtection {
    #[default]
    Memory,
    Disabled,
}

impl std::str::FromStr for ReplayProtection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            other => Err(format!("unknown replay protection mode {other:?}")),
        }
    }
}

/// Build the store for `mode`.
pub fn token_store(mode: ReplayProtection) -> Arc<dyn TokenStore> {
    match mode {
        ReplayProtection::Memory => Arc::new(MemoryTokenStore::new()),
        ReplayProtection::Disabled => {
            tracing::warn!("replay protection disabled; challenge tokens are reusable until expiry");
            Arc::new(NoopTokenStore)
        }
    }
}

/// Periodically purge expired entries from `store`. Must be called inside
/// a tokio runtime.
pub fn spawn_cleanup(store: Arc<dyn TokenStore>, interval: Duration) -> PeriodicTask {
    PeriodicTask::spawn("replay-cleanup", interval, move || {
        let removed = store.cleanup(zkid_core::temporal::unix_now());
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "expired token ids purged");
        }
    })
}

//! # Key Registry
//!
//! Tracks every verifying-key version the server has ever published, keyed
//! by `vk_id`. Exactly one version is active (the one new challenges are
//! issued for). Older versions are never deleted: [`KeyRegistry::deprecate`]
//! schedules an expiry one grace period out, and verification keeps
//! accepting proofs against the old key until then so in-flight clients are
//! not broken.
//!
//! [`KeyRegistry::is_valid`] is the single admission check. The
//! [`RotationMonitor`](crate::rotation::RotationMonitor) only reports.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zkid_core::{ErrorCode, KeyFingerprint};

use crate::rotation::{RotationEvent, RotationNotifier, DEFAULT_GRACE_PERIOD_SECS};

/// One published key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyVersion {
    /// Operator label, e.g. `v1.0.0`.
    pub version: String,
    pub vk_id: KeyFingerprint,
    pub pk_id: KeyFingerprint,
    pub created_at: DateTime<Utc>,
    /// `None` means no expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Maintained by the registry; ignored on registration.
    #[serde(default)]
    pub is_active: bool,
}

impl KeyVersion {
    pub fn new(version: impl Into<String>, vk_id: KeyFingerprint, pk_id: KeyFingerprint) -> Self {
        Self {
            version: version.into(),
            vk_id,
            pk_id,
            created_at: Utc::now(),
            expires_at: None,
            is_active: false,
        }
    }

    /// True if an expiry is set and `now` is past it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyRegistryError {
    #[error("key version already registered: {0}")]
    AlreadyRegistered(KeyFingerprint),

    #[error("key version not found: {0}")]
    NotFound(KeyFingerprint),

    #[error("no active key version")]
    NoActive,
}

impl KeyRegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyRegistered(_) => ErrorCode::InvalidConfig,
            Self::NotFound(_) | Self::NoActive => ErrorCode::KeyRotation,
        }
    }
}

/// Key version bookkeeping.
pub trait KeyRegistry: Send + Sync {
    /// Add a version. The first version registered becomes active.
    fn register(&self, version: KeyVersion) -> Result<(), KeyRegistryError>;

    fn get_active(&self) -> Result<KeyVersion, KeyRegistryError>;

    fn get(&self, vk_id: &KeyFingerprint) -> Result<KeyVersion, KeyRegistryError>;

    /// All versions, oldest first.
    fn list(&self) -> Vec<KeyVersion>;

    /// Known and not expired at `now`.
    fn is_valid_at(&self, vk_id: &KeyFingerprint, now: DateTime<Utc>) -> bool;

    fn is_valid(&self, vk_id: &KeyFingerprint) -> bool {
        self.is_valid_at(vk_id, Utc::now())
    }

    /// Make `vk_id` the active version, deactivating the previous one.
    fn set_active(&self, vk_id: &KeyFingerprint) -> Result<(), KeyRegistryError>;

    /// Set the version's expiry to `now` plus the grace period. Returns the
    /// new expiry.
    fn deprecate_at(
        &self,
        vk_id: &KeyFingerprint,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, KeyRegistryError>;

    fn deprecate(&self, vk_id: &KeyFingerprint) -> Result<DateTime<Utc>, KeyRegistryError> {
        self.deprecate_at(vk_id, Utc::now())
    }
}

#[derive(Default)]
struct Versions {
    by_id: HashMap<KeyFingerprint, KeyVersion>,
    active: Option<KeyFingerprint>,
}

/// In-memory registry behind a read-write lock.
pub struct MemoryKeyRegistry {
    inner: RwLock<Versions>,
    grace_period: Duration,
    notifier: Option<Arc<dyn RotationNotifier>>,
}

impl MemoryKeyRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Versions::default()),
            grace_period: Duration::seconds(DEFAULT_GRACE_PERIOD_SECS as i64),
            notifier: None,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Receive a [`RotationEvent`] whenever the active version changes.
    pub fn with_notifier(mut self, notifier: Arc<dyn RotationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }
}

impl Default for MemoryKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryKeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryKeyRegistry")
            .field("versions", &inner.by_id.len())
            .field("active", &inner.active)
            .field("grace_period", &self.grace_period)
            .finish()
    }
}

impl KeyRegistry for MemoryKeyRegistry {
    fn register(&self, mut version: KeyVersion) -> Result<(), KeyRegistryError> {
        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&version.vk_id) {
            return Err(KeyRegistryError::AlreadyRegistered(version.vk_id));
        }
        let vk_id = version.vk_id;
        version.is_active = inner.active.is_none();
        if version.is_active {
            inner.active = Some(vk_id);
        }
        tracing::info!(
            vk_id = %vk_id.short(),
            version = %version.version,
            active = version.is_active,
            "key version registered"
        );
        inner.by_id.insert(vk_id, version);
        Ok(())
    }

    fn get_active(&self) -> Result<KeyVersion, KeyRegistryError> {
        let inner = self.inner.read();
        let active = inner.active.ok_or(KeyRegistryError::NoActive)?;
        inner
            .by_id
            .get(&active)
            .cloned()
            .ok_or(KeyRegistryError::NotFound(active))
    }

    fn get(&self, vk_id: &KeyFingerprint) -> Result<KeyVersion, KeyRegistryError> {
        self.inner
            .read()
            .by_id
            .get(vk_id)
            .cloned()
            .ok_or(KeyRegistryError::NotFound(*vk_id))
    }

    fn list(&self) -> Vec<KeyVersion> {
        let mut versions: Vec<_> = self.inner.read().by_id.values().cloned().collect();
        versions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.vk_id.cmp(&b.vk_id))
        });
        versions
    }

    fn is_valid_at(&self, vk_id: &KeyFingerprint, now: DateTime<Utc>) -> bool {
        self.inner
            .read()
            .by_id
            .get(vk_id)
            .is_some_and(|v| !v.is_expired_at(now))
    }

    fn set_active(&self, vk_id: &KeyFingerprint) -> Result<(), KeyRegistryError> {
        let previous = {
            let mut inner = self.inner.write();
            if !inner.by_id.contains_key(vk_id) {
                return Err(KeyRegistryError::NotFound(*vk_id));
            }
            let previous = inner.active.replace(*vk_id);
            if previous == Some(*vk_id) {
                return Ok(());
            }
            if let Some(prev) = previous.and_then(|p| inner.by_id.get_mut(&p)) {
                prev.is_active = false;
            }
            if let Some(next) = inner.by_id.get_mut(vk_id) {
                next.is_active = true;
            }
            previous
        };

        let event = RotationEvent::rotation(previous, *vk_id);
        tracing::info!(
            previous = ?previous.map(|p| p.short()),
            active = %vk_id.short(),
            "active key version rotated"
        );
        if let Some(notifier) = &self.notifier {
            notifier.notify(&event);
        }
        Ok(())
    }

    fn deprecate_at(
        &self,
        vk_id: &KeyFingerprint,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, KeyRegistryError> {
        let mut inner = self.inner.write();
        let version = inner
            .by_id
            .get_mut(vk_id)
            .ok_or(KeyRegistryError::NotFound(*vk_id))?;
        let expires_at = now
            .checked_add_signed(self.grace_period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        version.expires_at = Some(expires_at);
        tracing::info!(vk_id = %vk_id.short(), %expires_at, "key version deprecated");
        Ok(expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::RotationEventKind;
    use parking_lot::Mutex;

    fn fp(tag: &str) -> KeyFingerprint {
        KeyFingerprint::of_bytes(tag.as_bytes())
    }

    fn version(tag: &str) -> KeyVersion {
        KeyVersion::new(tag, fp(tag), fp(&format!("pk-{tag}")))
    }

    #[test]
    fn test_first_registered_is_active() {
        let reg = MemoryKeyRegistry::new();
        assert_eq!(reg.get_active(), Err(KeyRegistryError::NoActive));
        reg.register(version("v1")).unwrap();
        reg.register(version("v2")).unwrap();
        let active = reg.get_active().unwrap();
        assert_eq!(active.vk_id, fp("v1"));
        assert!(active.is_active);
        assert!(!reg.get(&fp("v2")).unwrap().is_active);
    }

    #[test]
    fn test_duplicate_register_fails() {
        let reg = MemoryKeyRegistry::new();
        reg.register(version("v1")).unwrap();
        assert_eq!(
            reg.register(version("v1")),
            Err(KeyRegistryError::AlreadyRegistered(fp("v1")))
        );
    }

    #[test]
    fn test_registration_ignores_active_flag() {
        let reg = MemoryKeyRegistry::new();
        reg.register(version("v1")).unwrap();
        let mut v2 = version("v2");
        v2.is_active = true;
        reg.register(v2).unwrap();
        assert_eq!(reg.get_active().unwrap().vk_id, fp("v1"));
        assert!(!reg.get(&fp("v2")).unwrap().is_active);
    }

    #[test]
    fn test_set_active_switches() {
        let reg = MemoryKeyRegistry::new();
        reg.register(version("v1")).unwrap();
        reg.register(version("v2")).unwrap();
        reg.set_active(&fp("v2")).unwrap();
        assert_eq!(reg.get_active().unwrap().vk_id, fp("v2"));
        assert!(!reg.get(&fp("v1")).unwrap().is_active);
        assert_eq!(reg.list().iter().filter(|v| v.is_active).count(), 1);
    }

    #[test]
    fn test_set_active_unknown_fails() {
        let reg = MemoryKeyRegistry::new();
        assert_eq!(
            reg.set_active(&fp("nope")),
            Err(KeyRegistryError::NotFound(fp("nope")))
        );
    }

    #[test]
    fn test_validity() {
        let reg = MemoryKeyRegistry::new();
        assert!(!reg.is_valid(&fp("v1")));
        reg.register(version("v1")).unwrap();
        assert!(reg.is_valid(&fp("v1")));

        let now = Utc::now();
        let mut expired = version("old");
        expired.expires_at = Some(now - Duration::seconds(1));
        reg.register(expired).unwrap();
        assert!(!reg.is_valid_at(&fp("old"), now));
    }

    #[test]
    fn test_deprecate_keeps_key_valid_through_grace() {
        let reg = MemoryKeyRegistry::new().with_grace_period(Duration::days(30));
        reg.register(version("v1")).unwrap();
        let now = Utc::now();
        let exp = reg.deprecate_at(&fp("v1"), now).unwrap();
        assert_eq!(exp, now + Duration::days(30));
        assert!(reg.is_valid_at(&fp("v1"), now + Duration::days(29)));
        assert!(reg.is_valid_at(&fp("v1"), exp));
        assert!(!reg.is_valid_at(&fp("v1"), exp + Duration::seconds(1)));
        assert!(reg.get(&fp("v1")).is_ok());
    }

    #[test]
    fn test_default_grace_is_thirty_days() {
        assert_eq!(MemoryKeyRegistry::new().grace_period(), Duration::days(30));
    }

    #[test]
    fn test_set_active_notifies() {
        let seen = Arc::new(Mutex::new(Vec::<RotationEvent>::new()));
        let sink = Arc::clone(&seen);
        let notifier: Arc<dyn RotationNotifier> =
            Arc::new(move |e: &RotationEvent| sink.lock().push(e.clone()));
        let reg = MemoryKeyRegistry::new().with_notifier(notifier);
        reg.register(version("v1")).unwrap();
        reg.register(version("v2")).unwrap();
        reg.set_active(&fp("v2")).unwrap();
        reg.set_active(&fp("v2")).unwrap();

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, RotationEventKind::Rotation);
        assert_eq!(events[0].previous, Some(fp("v1")));
        assert_eq!(events[0].vk_id, fp("v2"));
    }

    #[test]
    fn test_list_sorted_by_creation() {
        let reg = MemoryKeyRegistry::new();
        let mut a = version("a");
        let mut b = version("b");
        a.created_at = Utc::now() - Duration::days(2);
        b.created_at = Utc::now() - Duration::days(1);
        reg.register(b).unwrap();
        reg.register(a).unwrap();
        let ids: Vec<_> = reg.list().into_iter().map(|v| v.vk_id).collect();
        assert_eq!(ids, vec![fp("a"), fp("b")]);
    }
}

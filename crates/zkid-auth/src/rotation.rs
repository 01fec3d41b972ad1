//! # Key Rotation Monitor
//!
//! Scans the [`KeyRegistry`] on a schedule and reports versions that are
//! about to expire or already have. Reporting is advisory: admission
//! decisions go through [`KeyRegistry::is_valid`] only.
//!
//! Events reach operators through a [`RotationNotifier`]. Closures, a tokio
//! channel ([`ChannelNotifier`]) and the log ([`LogNotifier`]) are provided.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use zkid_core::KeyFingerprint;

use crate::keys::KeyRegistry;
use crate::task::PeriodicTask;

pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 30 * 24 * 3600;
pub const DEFAULT_NOTIFY_BEFORE_EXPIRY_SECS: u64 = 7 * 24 * 3600;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// How long a deprecated key stays valid.
    pub grace_period_secs: u64,
    /// Lead time for `expiry_warning` events.
    pub notify_before_expiry_secs: u64,
    pub check_interval_secs: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            notify_before_expiry_secs: DEFAULT_NOTIFY_BEFORE_EXPIRY_SECS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
        }
    }
}

impl RotationConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::seconds(clamp_secs(self.grace_period_secs))
    }

    pub fn notify_before_expiry(&self) -> Duration {
        Duration::seconds(clamp_secs(self.notify_before_expiry_secs))
    }

    pub fn check_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.check_interval_secs)
    }
}

fn clamp_secs(secs: u64) -> i64 {
    // chrono panics beyond i64::MAX milliseconds.
    i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationEventKind {
    Rotation,
    ExpiryWarning,
    Expired,
}

impl RotationEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotation => "rotation",
            Self::ExpiryWarning => "expiry_warning",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    pub kind: RotationEventKind,
    /// The key the event is about. For rotations, the new active key.
    pub vk_id: KeyFingerprint,
    /// The previously active key, for rotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<KeyFingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl RotationEvent {
    pub fn rotation(previous: Option<KeyFingerprint>, active: KeyFingerprint) -> Self {
        let message = match previous {
            Some(prev) => format!("active key rotated from {} to {}", prev.short(), active.short()),
            None => format!("key {} activated", active.short()),
        };
        Self {
            kind: RotationEventKind::Rotation,
            vk_id: active,
            previous,
            expires_at: None,
            message,
        }
    }

    fn expiry_warning(vk_id: KeyFingerprint, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let hours = (expires_at - now).num_hours();
        Self {
            kind: RotationEventKind::ExpiryWarning,
            vk_id,
            previous: None,
            expires_at: Some(expires_at),
            message: format!("key {} expires in {hours}h", vk_id.short()),
        }
    }

    fn expired(vk_id: KeyFingerprint, expires_at: DateTime<Utc>) -> Self {
        Self {
            kind: RotationEventKind::Expired,
            vk_id,
            previous: None,
            expires_at: Some(expires_at),
            message: format!("key {} has expired", vk_id.short()),
        }
    }
}

/// Receives rotation events. Called synchronously; must not block.
pub trait RotationNotifier: Send + Sync {
    fn notify(&self, event: &RotationEvent);
}

impl<F> RotationNotifier for F
where
    F: Fn(&RotationEvent) + Send + Sync,
{
    fn notify(&self, event: &RotationEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded tokio channel. Events are dropped once
/// the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelNotifier(mpsc::UnboundedSender<RotationEvent>);

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RotationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl RotationNotifier for ChannelNotifier {
    fn notify(&self, event: &RotationEvent) {
        if self.0.send(event.clone()).is_err() {
            tracing::debug!(kind = event.kind.as_str(), "rotation event receiver closed");
        }
    }
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl RotationNotifier for LogNotifier {
    fn notify(&self, event: &RotationEvent) {
        match event.kind {
            RotationEventKind::Expired => {
                tracing::warn!(vk_id = %event.vk_id.short(), "{}", event.message)
            }
            _ => tracing::info!(
                kind = event.kind.as_str(),
                vk_id = %event.vk_id.short(),
                "{}",
                event.message
            ),
        }
    }
}

/// Periodic expiry scan over a key registry.
pub struct RotationMonitor {
    registry: Arc<dyn KeyRegistry>,
    config: RotationConfig,
    notifier: Arc<dyn RotationNotifier>,
}

impl RotationMonitor {
    pub fn new(
        registry: Arc<dyn KeyRegistry>,
        config: RotationConfig,
        notifier: Arc<dyn RotationNotifier>,
    ) -> Self {
        Self {
            registry,
            config,
            notifier,
        }
    }

    /// Scan every version once. A version expiring within the lead time
    /// yields `expiry_warning`; one past expiry yields `expired`. Versions
    /// without expiry are skipped. Returns the events raised.
    pub fn check_expiration(&self, now: DateTime<Utc>) -> Vec<RotationEvent> {
        let lead = self.config.notify_before_expiry();
        let events: Vec<_> = self
            .registry
            .list()
            .into_iter()
            .filter_map(|v| {
                let exp = v.expires_at?;
                if now > exp {
                    Some(RotationEvent::expired(v.vk_id, exp))
                } else if exp > now && exp - now <= lead {
                    Some(RotationEvent::expiry_warning(v.vk_id, exp, now))
                } else {
                    None
                }
            })
            .collect();

        for event in &events {
            metrics::counter!("zkid_key_rotation_events_total", "kind" => event.kind.as_str())
                .increment(1);
            self.notifier.notify(event);
        }
        events
    }

    /// Run [`check_expiration`](Self::check_expiration) every
    /// `check_interval_secs`. Must be called inside a tokio runtime.
    pub fn start(self) -> PeriodicTask {
        let period = self.config.check_interval();
        PeriodicTask::spawn("key-rotation-monitor", period, move || {
            self.check_expiration(Utc::now());
        })
    }
}

impl std::fmt::Debug for RotationMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

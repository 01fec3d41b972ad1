//! Background jobs that run on a fixed period until stopped.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Smallest period accepted. Shorter values are clamped up.
const MIN_PERIOD: Duration = Duration::from_millis(10);

/// A spawned job ticking every `period`. The first run happens one period
/// after spawn. Dropping the handle cancels the job.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `job` on the current tokio runtime.
    pub fn spawn<F>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let (cancel, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            tracing::debug!(task = name, period_ms = period.as_millis() as u64, "periodic task started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => job(),
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(task = name, "periodic task stopped");
        });
        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancel and wait for the job to exit.
    pub async fn stop(mut self) {
        let _ = self.cancel.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(task = self.name, error = %e, "periodic task ended abnormally");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_each_period_after_first() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::spawn("count", Duration::from_secs(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::spawn("halt", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(task.name(), "halt");
        task.stop().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let task = PeriodicTask::spawn("zero", Duration::ZERO, || {});
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.stop().await;
    }
}

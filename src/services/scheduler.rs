//! Interval-based recurring tasks.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Shortest period accepted by [`Scheduler::schedule_recurring`].
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct ScheduledTask {
    name: String,
    period: Duration,
    handle: JoinHandle<()>,
}

/// Runs tasks on fixed periods until cancelled.
///
/// The first run happens one period after scheduling. Ticks missed while a
/// task is still running are skipped, not queued: after an overrun the next
/// run comes one full period after the task finished. Cancellation is cooperative:
/// a task already running finishes before its loop exits.
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    shutdown: watch::Sender<bool>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tasks: Vec::new(),
            shutdown,
        }
    }

    /// Run `task` every `period`. Must be called inside a Tokio runtime.
    pub fn schedule_recurring<F, Fut>(&mut self, name: impl Into<String>, period: Duration, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let period = period.max(MIN_PERIOD);
        let mut shutdown = self.shutdown.subscribe();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                if *shutdown.borrow() {
                    break;
                }

                debug!("Running scheduled task '{}'", task_name);
                let started = Instant::now();
                task().await;
                if started.elapsed() >= period {
                    // An overrun leaves one stale tick ready; drop it.
                    ticker.reset();
                }
            }

            debug!("Scheduled task '{}' stopped", task_name);
        });

        info!("Scheduled '{}' every {:?}", name, period);
        self.tasks.push(ScheduledTask {
            name,
            period,
            handle,
        });
    }

    /// Names and periods of the scheduled tasks.
    pub fn tasks(&self) -> Vec<(String, Duration)> {
        self.tasks
            .iter()
            .map(|t| (t.name.clone(), t.period))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every task and wait for their loops to exit.
    pub async fn cancel_all(&mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.handle.await {
                debug!("Scheduled task '{}' ended abnormally: {}", task.name, e);
            }
        }
        // Allow scheduling again after a cancel.
        let _ = self.shutdown.send(false);
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_periodically_until_cancelled() {
        let mut scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        scheduler.schedule_recurring("count", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(75)).await;
        scheduler.cancel_all().await;
        let after_cancel = runs.load(Ordering::SeqCst);
        assert!(after_cancel >= 2, "expected several runs, got {}", after_cancel);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_cancel);
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_does_not_queue_a_tick() {
        let mut scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        scheduler.schedule_recurring("overrun", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(25)).await;
            }
        });

        // Runs at 10 (until 35), then 45.
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        scheduler.cancel_all().await;
    }

    #[tokio::test]
    async fn test_first_run_waits_one_period() {
        let mut scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        scheduler.schedule_recurring("slow", Duration::from_secs(3600), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.tasks()[0].0, "slow");
        scheduler.cancel_all().await;
    }
}

//! Background sweep of expired entries.
//!
//! Tokens issued during a disconnected render are not always redeemed (the
//! client may never connect). The sweeper is the safety net: a single task,
//! started once per process, that periodically drops everything expired.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::config::DEFAULT_SWEEP_EVERY;
use crate::store::RehydrationStore;

/// Something the sweeper can clean.
pub trait Sweep: Send + Sync + 'static {
    /// Remove everything expired at `now`, returning how many entries went.
    fn sweep(&self, now: Instant) -> usize;
}

impl<V> Sweep for RehydrationStore<V>
where
    V: Send + Sync + 'static,
{
    fn sweep(&self, now: Instant) -> usize {
        RehydrationStore::sweep(self, now)
    }
}

/// Handle to a running sweep task.
///
/// Dropping the handle stops the task; [`SweeperHandle::shutdown`] also
/// waits for it to finish. Use [`SweeperHandle::detach`] to keep the loop
/// running for the rest of the process.
#[must_use = "dropping the handle stops the sweeper"]
pub struct SweeperHandle {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweep loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Sweep task ended abnormally");
        }
    }

    /// Release the handle without stopping the loop. The sweep then runs
    /// until the tokio runtime shuts down.
    pub fn detach(mut self) {
        self.cancel.take();
        self.task.take();
        debug!("Sweeper detached");
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}

/// Spawn the sweep loop on the current tokio runtime.
///
/// The first pass runs one `period` after spawning. A pass that panics is
/// logged and the loop carries on. A zero period falls back to the default.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
#[must_use = "dropping the handle stops the sweeper"]
pub fn spawn_sweeper<S: Sweep>(target: S, period: Duration) -> SweeperHandle {
    let period = if period.is_zero() {
        warn!(
            default_ms = millis(DEFAULT_SWEEP_EVERY),
            "Sweep period of zero requested, using default"
        );
        DEFAULT_SWEEP_EVERY
    } else {
        period
    };

    let cancel = CancellationToken::new();
    let child = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        debug!(period_ms = millis(period), "Sweeper started");
        loop {
            tokio::select! {
                _ = child.cancelled() => {
                    debug!("Sweeper stopped");
                    break;
                }
                _ = ticker.tick() => run_pass(&target),
            }
        }
    });

    SweeperHandle {
        cancel: Some(cancel),
        task: Some(task),
    }
}

fn millis(period: Duration) -> u64 {
    u64::try_from(period.as_millis()).unwrap_or(u64::MAX)
}

fn run_pass<S: Sweep>(target: &S) {
    match catch_unwind(AssertUnwindSafe(|| target.sweep(Instant::now()))) {
        Ok(removed) => trace!(removed, "Sweep pass complete"),
        Err(panic) => error!(
            panic = %panic_message(panic.as_ref()),
            "Sweep pass panicked, will retry next period"
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

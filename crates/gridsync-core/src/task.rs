use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::api::SimulationApi;
use crate::controller::{AutoRunState, SyncController, SyncState};

const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// A background loop owned by a screen. Dropping the handle aborts the loop;
/// a request still in flight is dropped with it and never applied.
pub struct TaskHandle {
    name: &'static str,
    join: JoinHandle<()>,
}

impl TaskHandle {
    fn spawn<F>(name: &'static str, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            join: tokio::spawn(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if !self.join.is_finished() {
            debug!(task = self.name, "stopping task");
        }
        self.join.abort();
    }
}

impl<A: SimulationApi + 'static> SyncController<A> {
    /// Polls `GET /` every `period` (at least 1 ms). Ticks never overlap: a
    /// slow poll delays the next one and missed ticks are skipped.
    pub fn spawn_poller(self: &Arc<Self>, period: Duration) -> TaskHandle {
        let period = period.max(MIN_POLL_PERIOD);
        let controller = Arc::clone(self);
        TaskHandle::spawn("poller", async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let _ = controller.fetch_snapshot().await;
            }
        })
    }

    /// Runs auto steps while auto-run is on. Follows toggles, resets and
    /// failure stops through the state channel.
    pub fn spawn_auto_runner(self: &Arc<Self>) -> TaskHandle {
        let controller = Arc::clone(self);
        let mut updates = self.subscribe();
        TaskHandle::spawn("auto-run", async move {
            loop {
                let auto_run = updates.borrow_and_update().auto_run;
                if auto_run.is_running {
                    if !controller.drive_auto_run(auto_run, &mut updates).await {
                        return;
                    }
                } else if updates.changed().await.is_err() {
                    return;
                }
            }
        })
    }

    /// One running period of auto-run. Returns false once the state channel
    /// is closed.
    async fn drive_auto_run(
        &self,
        started: AutoRunState,
        updates: &mut watch::Receiver<SyncState>,
    ) -> bool {
        let period = Duration::from_secs(started.interval_secs);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = started.interval_secs, "auto-run started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_step(true).await {
                        debug!(error = %err, "auto step did not apply");
                    }
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }

            let current = self.auto_run();
            if !current.is_running || current.generation != started.generation {
                info!(steps = current.step_count, "auto-run stopped");
                return true;
            }
        }
    }
}

//! The only autonomous activity in the system: one long-lived background
//! task per process that runs a snapshot tick on a fixed interval.
//! Modeled as a cancellable task with an explicit start/stop lifecycle so
//! a single tick can also be driven synchronously via
//! [`SnapshotEngine::run_tick`] in tests and interactive callers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::engine::SnapshotEngine;

pub struct SnapshotScheduler;

impl SnapshotScheduler {
    /// Spawn the tick loop. The first tick runs immediately; later ticks
    /// are spaced by `every` and never scheduled more tightly than the
    /// interval, even when a tick overruns.
    pub fn start(engine: Arc<SnapshotEngine>, every: Duration) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = engine.run_tick().await;
                        info!(%stats, "Snapshot tick complete");
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Snapshot scheduler stopped");
        });
        SchedulerHandle { shutdown_tx, task }
    }
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop and wait for it to finish. A tick already in
    /// flight runs to completion; there is no mid-call cancellation.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

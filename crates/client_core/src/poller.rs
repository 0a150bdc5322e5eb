//! Periodic speaker refresh.
//!
//! The poll loop only asks the controller for a tick. Whether that tick reaches the
//! network (speakers view visible, no load already in flight) is the controller's call.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::controller::{Controller, LoadOutcome};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Running poll loop. Dropping the handle aborts the task.
pub struct PollHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Signals the loop and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Starts ticking `controller` every `interval`, first tick one interval from now.
pub fn spawn_speaker_poll(controller: Arc<Controller>, interval: Duration) -> PollHandle {
    let interval = interval.max(MIN_POLL_INTERVAL);
    let (shutdown, mut shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "speaker polling started");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    match controller.poll_tick().await {
                        Ok(LoadOutcome::Applied) => debug!("speakers refreshed by poll"),
                        Ok(outcome) => debug!(?outcome, "poll tick did not apply"),
                        // Already rendered as a section error; keep polling.
                        Err(err) => debug!(%err, "poll tick failed"),
                    }
                }
            }
        }
        info!("speaker polling stopped");
    });

    PollHandle {
        shutdown: Some(shutdown),
        task: Some(task),
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;

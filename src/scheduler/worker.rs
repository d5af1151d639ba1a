use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::event::Event;

pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// One polling loop body. A cycle always runs to completion.
#[async_trait]
pub trait Track: Send + 'static {
    fn name(&self) -> &'static str;

    async fn cycle(&mut self) -> Vec<Event>;
}

#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signals the loop and waits for the cycle in flight to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.join.await {
            log::warn!("{} loop ended abnormally: {}", self.name, e);
        }
    }
}

/// Runs `track` every `interval` (at least [`MIN_INTERVAL`]) and forwards its
/// events in order. The stop signal is only observed between cycles.
pub fn spawn<T: Track>(
    mut track: T,
    interval: Duration,
    events: mpsc::Sender<Event>,
) -> WorkerHandle {
    let name = track.name();
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let should_stop = tokio::select! {
                _ = ticker.tick() => false,
                _ = &mut stop_rx => true,
            };
            if should_stop {
                log::debug!("{} loop stopping", name);
                return;
            }

            for event in track.cycle().await {
                if events.send(event).await.is_err() {
                    log::debug!("{} loop: event channel closed", name);
                    return;
                }
            }
        }
    });

    WorkerHandle {
        name,
        stop_tx,
        join,
    }
}

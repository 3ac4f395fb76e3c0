use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::notify::Notifier;

/// Broadcast flag flipped once on operator interrupt; every periodic loop
/// holds a receiver and stops taking new ticks when it trips.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `cycle` on a fixed cadence until shutdown. The body runs to
/// completion before the next tick is taken and missed ticks are skipped,
/// so a slow cycle is never overlapped or queued behind itself. Cycle
/// errors are logged and notified; they never stop the loop.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    notifier: Arc<dyn Notifier>,
    mut cycle: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(service = name, period_ms = period.as_millis() as u64, "service started");

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

            if let Err(err) = cycle().await {
                warn!(service = name, error = %format!("{err:#}"), "service cycle failed");
                notifier.send(&format!("{name}: service cycle failed")).await;
            }
        }

        info!(service = name, "service stopped");
    })
}

/// Waits up to `grace` for the loops to drain, then gives up; in-flight
/// network calls are not aborted, the caller force-exits afterwards.
pub async fn drain(handles: Vec<JoinHandle<()>>, grace: Duration) {
    let all = async {
        for handle in handles {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(grace, all).await.is_err() {
        warn!(grace_secs = grace.as_secs(), "grace period elapsed with work still in flight");
    }
}

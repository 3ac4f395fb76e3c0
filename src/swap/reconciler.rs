use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use futures::future::join_all;
use tracing::{info, warn};

use crate::assets::AssetCatalog;
use crate::notify::Notifier;
use crate::retry::{RetryOutcome, RetryPolicy, retry};
use crate::swap::status::{RouteOutcome, StatusMask};
use crate::swap::store::SqliteSwapStore;
use crate::swap::{SwapState, SwapTask};
use crate::venue::ExecutionVenue;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub max_tasks_per_cycle: usize,
    pub status_retry: RetryPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_cycle: 10,
            status_retry: RetryPolicy::new(3, Duration::from_millis(500)).verbose(),
        }
    }
}

/// Summary of one reconciliation tick.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub waiting: Vec<i64>,
    pub succeeded: Vec<i64>,
    pub partial: Vec<i64>,
    pub timed_out: Vec<i64>,
    pub failed: Vec<i64>,
}

/// Polls the venue for in-flight tasks and merges sub-transaction outcomes
/// into one terminal state per task.
pub struct ResultReconciler {
    venue: Arc<dyn ExecutionVenue>,
    notifier: Arc<dyn Notifier>,
    store: Arc<Mutex<SqliteSwapStore>>,
    catalog: Arc<AssetCatalog>,
    cfg: ReconcilerConfig,
}

impl ResultReconciler {
    pub fn new(
        venue: Arc<dyn ExecutionVenue>,
        notifier: Arc<dyn Notifier>,
        store: Arc<Mutex<SqliteSwapStore>>,
        catalog: Arc<AssetCatalog>,
        cfg: ReconcilerConfig,
    ) -> Self {
        Self {
            venue,
            notifier,
            store,
            catalog,
            cfg,
        }
    }

    /// One reconciler tick. Status queries are read-only and run
    /// concurrently; transitions are applied sequentially afterwards.
    pub async fn run_cycle(&self) -> Result<ReconcileReport> {
        let tasks = self
            .store
            .lock()
            .expect("store mutex poisoned")
            .list_by_state(SwapState::Sent, Some(self.cfg.max_tasks_per_cycle))
            .context("list sent tasks")?;

        let mut report = ReconcileReport::default();
        if tasks.is_empty() {
            return Ok(report);
        }

        let masks = join_all(tasks.iter().map(|task| self.aggregate_status(task))).await;

        for (task, mask) in tasks.iter().zip(masks) {
            let description = task.description(&self.catalog);
            let (state, message) = match mask.outcome() {
                RouteOutcome::InProcess => {
                    info!(task = task.id, "swap is still in progress, waiting more");
                    report.waiting.push(task.id);
                    continue;
                }
                RouteOutcome::Success => {
                    report.succeeded.push(task.id);
                    (SwapState::Success, format!("{description} has succeeded!"))
                }
                RouteOutcome::Partial => {
                    report.partial.push(task.id);
                    (
                        SwapState::Partial,
                        format!("{description} has partially succeeded!"),
                    )
                }
                RouteOutcome::Timeout => {
                    report.timed_out.push(task.id);
                    (SwapState::Timeout, format!("{description} has timed out!"))
                }
                RouteOutcome::Failure => {
                    report.failed.push(task.id);
                    (SwapState::Failed, format!("{description} has failed!"))
                }
            };

            self.store
                .lock()
                .expect("store mutex poisoned")
                .finish(task.id, state, mask)
                .with_context(|| format!("record task {} as {state}", task.id))?;
            info!(task = task.id, %state, mask = mask.bits(), "swap reconciled");
            self.notifier.send(&message).await;
        }

        Ok(report)
    }

    /// Combined status for one task. Query errors and empty replies count as
    /// timed out for this cycle; the next cycle re-queries.
    async fn aggregate_status(&self, task: &SwapTask) -> StatusMask {
        let Some(route_id) = task.route_id else {
            warn!(task = task.id, "sent task has no route id");
            return StatusMask::TIMED_OUT;
        };

        let venue = &self.venue;
        let outcome = retry(&self.cfg.status_retry, move || async move {
            venue.query_status(route_id).await.map_err(anyhow::Error::new)
        })
        .await;

        match outcome {
            RetryOutcome::Completed(statuses) if statuses.is_empty() => {
                warn!(task = task.id, route_id, "no status data on route");
                StatusMask::TIMED_OUT
            }
            RetryOutcome::Completed(statuses) => StatusMask::combine(statuses),
            RetryOutcome::Exhausted => {
                warn!(
                    task = task.id,
                    route_id, "either no data on route or the venue is off"
                );
                StatusMask::TIMED_OUT
            }
        }
    }
}

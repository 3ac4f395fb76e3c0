use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::{info, warn};

use crate::assets::{AssetCatalog, AssetId, AssetInfo};
use crate::config::SwapPolicy;
use crate::notify::Notifier;
use crate::retry::{RetryOutcome, RetryPolicy, retry, retry_notify};
use crate::swap::eligibility::{PriceSnapshot, check_swap_eligibility};
use crate::swap::status::StatusMask;
use crate::swap::store::SqliteSwapStore;
use crate::swap::{SwapState, SwapTask};
use crate::venue::{ExecutionVenue, PlanRouteRequest, PlannedRoute, VenueError};
use crate::wallet::BatchSubmitter;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_tasks_per_cycle: usize,
    /// Spacing between submissions within one cycle, to respect the
    /// account's confirmation latency.
    pub inter_task_delay: Duration,
    pub plan_retry: RetryPolicy,
    /// Retry policy for the submission step.
    pub submit_retry: RetryPolicy,
    pub referral: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_cycle: 10,
            inter_task_delay: Duration::from_millis(450),
            plan_retry: RetryPolicy::new(3, Duration::from_secs(1)).verbose(),
            submit_retry: RetryPolicy::new(10, Duration::from_secs(1)).verbose(),
            referral: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Sent,
    Canceled,
    Failed,
}

/// Per-item results of one cycle, collected instead of aborting the batch.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub sent: Vec<i64>,
    pub canceled: Vec<i64>,
    pub failed: Vec<i64>,
    pub errors: Vec<(i64, String)>,
}

impl CycleReport {
    pub fn processed(&self) -> usize {
        self.sent.len() + self.canceled.len() + self.failed.len() + self.errors.len()
    }
}

/// Drains pending tasks: validates them, plans a route, submits the signed
/// batch, and records the transition.
pub struct SwapOrchestrator {
    venue: Arc<dyn ExecutionVenue>,
    wallet: Arc<dyn BatchSubmitter>,
    notifier: Arc<dyn Notifier>,
    store: Arc<Mutex<SqliteSwapStore>>,
    catalog: Arc<AssetCatalog>,
    policy: SwapPolicy,
    cfg: OrchestratorConfig,
}

impl SwapOrchestrator {
    pub fn new(
        venue: Arc<dyn ExecutionVenue>,
        wallet: Arc<dyn BatchSubmitter>,
        notifier: Arc<dyn Notifier>,
        store: Arc<Mutex<SqliteSwapStore>>,
        catalog: Arc<AssetCatalog>,
        policy: SwapPolicy,
        cfg: OrchestratorConfig,
    ) -> Self {
        Self {
            venue,
            wallet,
            notifier,
            store,
            catalog,
            policy,
            cfg,
        }
    }

    /// One orchestrator tick. Tasks are processed strictly sequentially with
    /// an inter-task delay; a failure in one task never aborts the rest.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let tasks = self
            .store
            .lock()
            .expect("store mutex poisoned")
            .list_by_state(SwapState::Pending, Some(self.cfg.max_tasks_per_cycle))
            .context("list pending tasks")?;

        let mut report = CycleReport::default();
        if tasks.is_empty() {
            return Ok(report);
        }

        let total = tasks.len();
        for (index, task) in tasks.into_iter().enumerate() {
            let description = task.description(&self.catalog);
            match self.process_task(&task).await {
                Ok(TaskOutcome::Sent) => report.sent.push(task.id),
                Ok(TaskOutcome::Canceled) => report.canceled.push(task.id),
                Ok(TaskOutcome::Failed) => report.failed.push(task.id),
                Err(err) => {
                    warn!(task = task.id, error = %format!("{err:#}"), "swap task processing failed");
                    self.notifier
                        .send(&format!("Swap failed: {description}"))
                        .await;
                    report.errors.push((task.id, format!("{err:#}")));
                }
            }

            if index + 1 < total {
                tokio::time::sleep(self.cfg.inter_task_delay).await;
            }
        }

        info!(
            sent = report.sent.len(),
            canceled = report.canceled.len(),
            failed = report.failed.len(),
            errors = report.errors.len(),
            "swap cycle done"
        );
        Ok(report)
    }

    async fn process_task(&self, task: &SwapTask) -> Result<TaskOutcome> {
        let description = task.description(&self.catalog);

        for asset_id in [task.asset_offer, task.asset_ask] {
            if !self.is_supported(asset_id) {
                warn!(task = task.id, asset = %asset_id, "unsupported asset");
                self.cancel(task, StatusMask::NEW)?;
                self.notifier
                    .send(&format!(
                        "Asset {asset_id} is not supported, swap canceled ({description})"
                    ))
                    .await;
                return Ok(TaskOutcome::Canceled);
            }
        }

        let offer = self
            .catalog
            .by_id(task.asset_offer)
            .context("offered asset vanished from catalog")?
            .clone();
        let ask = self
            .catalog
            .by_id(task.asset_ask)
            .context("asked asset vanished from catalog")?
            .clone();

        let prices = self.unpack_snapshot(task);
        let verdict =
            check_swap_eligibility(&self.policy, &offer, task.amount, &ask, prices.as_ref());
        if !verdict.allows_swap() {
            info!(task = task.id, ?verdict, "swap is not eligible");
            self.cancel(task, StatusMask::NEW)?;
            self.notifier
                .send(&format!(
                    "Swap canceled ({} {} -> {})",
                    offer.from_wei(task.amount),
                    offer.symbol,
                    ask.symbol
                ))
                .await;
            return Ok(TaskOutcome::Canceled);
        }

        let route = match self.plan(task, &offer, &ask).await {
            Ok(route) => route,
            Err(reason) => {
                warn!(task = task.id, %reason, "route planning gave no usable route");
                match reason {
                    PlanFailure::NoPath | PlanFailure::Rejected(_) => {
                        self.cancel(task, StatusMask::NEW)?;
                        self.notifier
                            .send(&format!("No route for swap, canceled: {description}"))
                            .await;
                        return Ok(TaskOutcome::Canceled);
                    }
                    PlanFailure::Exhausted => {
                        self.fail(task)?;
                        self.notifier
                            .send(&format!("Route planning failed for: {description}"))
                            .await;
                        return Ok(TaskOutcome::Failed);
                    }
                }
            }
        };

        let wallet = &self.wallet;
        let messages = &route.messages;
        let submitted = retry_notify(
            &self.cfg.submit_retry,
            move || async move { wallet.submit_batch(messages).await.map_err(anyhow::Error::new) },
            |_| warn!("swap submission failed, retrying"),
        )
        .await;

        let Some(query_id) = submitted.into_value() else {
            self.fail(task)?;
            self.notifier
                .send(&format!("Failed to send swap messages for: {description}"))
                .await;
            return Ok(TaskOutcome::Failed);
        };

        self.store
            .lock()
            .expect("store mutex poisoned")
            .mark_sent(task.id, route.route_id, query_id)
            .context("record sent task")?;
        info!(
            task = task.id,
            route_id = route.route_id,
            query_id,
            "swap sent"
        );
        self.notifier
            .send(&format!("Swap sent: {description}"))
            .await;
        Ok(TaskOutcome::Sent)
    }

    fn is_supported(&self, id: AssetId) -> bool {
        self.catalog.contains_id(id) && self.policy.is_supported(id)
    }

    fn unpack_snapshot(&self, task: &SwapTask) -> Option<PriceSnapshot> {
        let bytes = task.price_snapshot.as_deref()?;
        match PriceSnapshot::decode(bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(task = task.id, error = %format!("{err:#}"), "failed to unpack prices");
                None
            }
        }
    }

    /// Plans a route under the pair's policy limits. Transport errors are
    /// retried; definitive venue rejections short-circuit.
    async fn plan(
        &self,
        task: &SwapTask,
        offer: &AssetInfo,
        ask: &AssetInfo,
    ) -> Result<PlannedRoute, PlanFailure> {
        let limits = self.policy.swap_limits(offer.id, ask.id);
        let request = PlanRouteRequest {
            offer_address: offer.address.routing_repr().to_string(),
            ask_address: ask.address.routing_repr().to_string(),
            amount: offer.from_wei(task.amount),
            max_slippage: limits.max_slippage,
            max_length: limits.max_length,
            sender: self.wallet.address().to_string(),
            referral: self.cfg.referral.clone(),
        };

        let venue = &self.venue;
        let request = &request;
        let outcome = retry(&self.cfg.plan_retry, move || async move {
            match venue.plan_route(request).await {
                Ok(route) => Ok(Ok(route)),
                Err(err) if !err.is_retryable() => Ok(Err(err)),
                Err(err) => Err(anyhow::Error::new(err)),
            }
        })
        .await;

        match outcome {
            RetryOutcome::Completed(Ok(route)) => Ok(route),
            RetryOutcome::Completed(Err(VenueError::NoPathFound)) => Err(PlanFailure::NoPath),
            RetryOutcome::Completed(Err(err)) => Err(PlanFailure::Rejected(format!("{err}"))),
            RetryOutcome::Exhausted => Err(PlanFailure::Exhausted),
        }
    }

    fn cancel(&self, task: &SwapTask, mask: StatusMask) -> Result<()> {
        self.store
            .lock()
            .expect("store mutex poisoned")
            .finish(task.id, SwapState::Canceled, mask)
            .context("record canceled task")
    }

    fn fail(&self, task: &SwapTask) -> Result<()> {
        self.store
            .lock()
            .expect("store mutex poisoned")
            .finish(task.id, SwapState::Failed, StatusMask::FAILED)
            .context("record failed task")
    }
}

#[derive(Debug)]
enum PlanFailure {
    NoPath,
    Rejected(String),
    Exhausted,
}

impl std::fmt::Display for PlanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPath => f.write_str("no path found"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
            Self::Exhausted => f.write_str("retries exhausted"),
        }
    }
}

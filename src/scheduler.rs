use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Task, TaskKind, TaskResult, TaskSpec, TaskStatus};
use crate::services::{AnalysisOptions, DealAnalyzer, DealNotifier, DealTracker, ProductSource, TaskQueue};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Counts for a single cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub notified: usize,
}

/// Totals since the scheduler was built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub notified: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl SchedulerStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.dispatched += report.dispatched as u64;
        self.succeeded += report.succeeded as u64;
        self.failed += report.failed as u64;
        self.notified += report.notified as u64;
        self.last_cycle_at = Some(Utc::now());
    }
}

enum Dispatch {
    Succeeded { notified: bool },
    Failed,
}

/// Periodic driver: drains the task queue in bounded concurrent batches
pub struct Scheduler {
    queue: Arc<TaskQueue>,
    source: Arc<dyn ProductSource>,
    analyzer: DealAnalyzer,
    tracker: Arc<DealTracker>,
    notifier: Arc<dyn DealNotifier>,
    config: SchedulerConfig,
    stats: Mutex<SchedulerStats>,
}

impl Scheduler {
    pub fn new(
        queue: Arc<TaskQueue>,
        source: Arc<dyn ProductSource>,
        analyzer: DealAnalyzer,
        tracker: Arc<DealTracker>,
        notifier: Arc<dyn DealNotifier>,
    ) -> Self {
        Self {
            queue,
            source,
            analyzer,
            tracker,
            notifier,
            config: SchedulerConfig::default(),
            stats: Mutex::new(SchedulerStats::default()),
        }
    }

    /// Set scheduler configuration
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn tracker(&self) -> &Arc<DealTracker> {
        &self.tracker
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.lock().clone()
    }

    /// Run cycles on the configured cadence until `shutdown` flips to true or its
    /// sender goes away. A cycle already running is always allowed to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Scheduler started, every {:?}, up to {} tasks per cycle",
            self.config.interval(),
            self.config.dispatch_limit()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let report = self.run_cycle().await;
            if report.dispatched > 0 {
                info!(
                    dispatched = report.dispatched,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    notified = report.notified,
                    "Scheduler cycle finished"
                );
            }
        }

        info!("Scheduler stopped");
    }

    /// One cycle: dequeue up to the dispatch limit, run every task concurrently and
    /// wait for all of them to be recorded
    pub async fn run_cycle(&self) -> CycleReport {
        if self.queue.is_empty() {
            debug!("Task queue empty, skipping cycle");
            return CycleReport::default();
        }

        let batch = self.queue.dequeue_batch(self.config.dispatch_limit());
        let outcomes = join_all(batch.into_iter().map(|task| self.dispatch(task))).await;

        let mut report = CycleReport {
            dispatched: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Dispatch::Succeeded { notified } => {
                    report.succeeded += 1;
                    if notified {
                        report.notified += 1;
                    }
                }
                Dispatch::Failed => report.failed += 1,
            }
        }

        self.stats.lock().record(&report);
        report
    }

    async fn dispatch(&self, task: Task) -> Dispatch {
        let id = task.id;
        let outcome = match task.kind {
            TaskKind::Product => self.process_product(&task).await,
            TaskKind::Category => self.expand_category(&task).await.map(|result| (result, false)),
        };

        match outcome {
            Ok((result, notified)) => match self.queue.complete(id, result) {
                Ok(()) => Dispatch::Succeeded { notified },
                Err(e) => {
                    error!(task_id = %id, "Could not complete task: {}", e);
                    Dispatch::Failed
                }
            },
            Err(e) => {
                match self.queue.fail(id, e.to_string()) {
                    Ok(TaskStatus::Failed) => {
                        error!(task_id = %id, target = %task.target, "Task exhausted its retries: {}", e)
                    }
                    Ok(_) => {}
                    Err(err) => error!(task_id = %id, "Could not record task failure: {}", err),
                }
                Dispatch::Failed
            }
        }
    }

    async fn process_product(&self, task: &Task) -> AppResult<(TaskResult, bool)> {
        let product = self
            .source
            .fetch_product(&task.target, task.market)
            .await
            .into_result()?;

        let cost_price = match task.cost_price {
            Some(cost_price) => cost_price,
            None => product
                .price
                .checked_mul(self.config.estimated_cost_ratio)
                .ok_or_else(|| AppError::overflow("estimated cost"))?
                .round_dp(2),
        };
        let mut options = AnalysisOptions::new(cost_price, self.config.default_fulfillment);
        if let Some(category) = &task.category {
            options = options.with_category(category.clone());
        }

        let deal = self.analyzer.analyze(product, &options)?;
        let outcome = self.tracker.track(&deal);

        // A failed notification does not fail the task; the deal is already tracked.
        let notified = if outcome.should_notify(&deal) {
            match self.notifier.notify(&deal).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(item_id = deal.item_id(), "Deal notification failed: {}", e);
                    false
                }
            }
        } else {
            false
        };

        Ok((
            TaskResult::Analyzed {
                deal_id: deal.id,
                qualifies: deal.qualifies,
            },
            notified,
        ))
    }

    async fn expand_category(&self, task: &Task) -> AppResult<TaskResult> {
        let listing = self
            .source
            .fetch_category(&task.target, task.market, self.config.category_max_items)
            .await
            .into_result()?;

        let children = listing
            .item_ids
            .into_iter()
            .take(self.config.category_max_items)
            .map(|item_id| {
                let mut spec = TaskSpec::product(item_id, task.market)
                    .with_priority(task.priority)
                    .with_max_retries(task.max_retries);
                if let Some(category) = &task.category {
                    spec = spec.with_category(category.clone());
                }
                if let Some(cost_price) = task.cost_price {
                    spec = spec.with_cost_price(cost_price);
                }
                spec
            });

        let discovered = self.queue.enqueue_many(children).len();
        info!(
            task_id = %task.id,
            category = %task.target,
            market = %task.market,
            discovered,
            total = listing.total,
            "Category expanded"
        );
        Ok(TaskResult::Expanded { discovered })
    }
}

//! Scheduler loop.
//!
//! One tick runs one pass over the whole task set. Tasks are processed
//! sequentially; a task's failure is recorded in the [`PassReport`] and never
//! stops the pass. Only successful checks advance `last_checked_date`.

use crate::alert::{notify_all, Alert, AlertSink};
use crate::clock::Clock;
use crate::error::Result;
use crate::policy::{classify, FailureClass};
use crate::store::TaskStore;
use crate::task::MonitoringTask;
use crate::workflow::{ChangeWorkflow, CheckReport};
use chrono::NaiveDate;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default time between passes.
pub const DEFAULT_TICK: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    NotDue,
    Checked { report: Box<CheckReport> },
    Skipped { reason: String },
    Failed { class: FailureClass, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub aoi_id: String,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub date: NaiveDate,
    pub results: Vec<TaskResult>,
}

impl PassReport {
    fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn not_due(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::NotDue))
    }

    pub fn checked(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Checked { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Failed { .. }))
    }

    pub fn alerts(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Checked { report } if report.decision.alerted))
    }
}

pub struct Scheduler {
    store: TaskStore,
    workflow: ChangeWorkflow,
    clock: Arc<dyn Clock>,
    sinks: Vec<Box<dyn AlertSink>>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(store: TaskStore, workflow: ChangeWorkflow, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            workflow,
            clock,
            sinks: Vec::new(),
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Run one pass: lock, load, check due tasks, rewrite the store.
    ///
    /// Errors are only returned for store failures; in that case nothing is
    /// written.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let today = self.clock.today();
        let _lock = self.store.lock()?;
        let mut tasks = self.store.load()?;
        info!(date = %today, tasks = tasks.len(), "monitoring pass started");

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks.iter_mut() {
            let outcome = self.process(task, today).await;
            results.push(TaskResult {
                aoi_id: task.aoi_id.clone(),
                outcome,
            });
        }

        self.store.save(&tasks)?;
        let report = PassReport {
            date: today,
            results,
        };
        info!(
            checked = report.checked(),
            skipped = report.skipped(),
            failed = report.failed(),
            not_due = report.not_due(),
            alerts = report.alerts(),
            "monitoring pass finished"
        );
        Ok(report)
    }

    async fn process(&self, task: &mut MonitoringTask, today: NaiveDate) -> TaskOutcome {
        if !task.is_due(today) {
            debug!(aoi_id = %task.aoi_id, last = ?task.last_checked_date, "not due");
            return TaskOutcome::NotDue;
        }

        info!(aoi_id = %task.aoi_id, "task due, checking");
        match self.workflow.check(task, today).await {
            Ok(report) => {
                task.last_checked_date = Some(report.current_window.end);
                if report.decision.alerted {
                    notify_all(&self.sinks, &Alert::from_check(task, &report)).await;
                }
                TaskOutcome::Checked {
                    report: Box::new(report),
                }
            }
            Err(e) => match classify(&e) {
                FailureClass::Transient => {
                    warn!(aoi_id = %task.aoi_id, reason = %e, "check skipped, will retry next pass");
                    TaskOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
                class => {
                    error!(aoi_id = %task.aoi_id, %class, error = %e, "check failed");
                    TaskOutcome::Failed {
                        class,
                        error: e.to_string(),
                    }
                }
            },
        }
    }

    /// Run passes every tick until `shutdown` resolves.
    ///
    /// The first pass starts immediately. Shutdown is observed between
    /// passes; a pass in progress runs to completion. A failed pass is
    /// logged and the loop continues.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(tick = ?self.tick, store = %self.store.path().display(), "scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_pass().await {
                        error!(error = %e, "monitoring pass aborted");
                    }
                }
            }
        }
    }
}

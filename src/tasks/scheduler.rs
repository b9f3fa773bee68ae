use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{sleep, Duration};

use crate::api;
use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::db::types::JobKind;
use crate::services::ai_grading::AiGradingService;
use crate::services::storage::StorageService;
use crate::tasks::handlers::{GradingHandlers, HandlerError, JobHandler, JobOutcome};
use crate::tasks::job::{Job, JobId};
use crate::tasks::recovery;
use crate::tasks::store::{JobStore, StoreError};

#[derive(Debug, Clone, Copy)]
pub(crate) struct DispatcherConfig {
    pub(crate) concurrency: usize,
    pub(crate) idle_backoff: Duration,
    pub(crate) defer_delay: Duration,
}

impl DispatcherConfig {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            concurrency: settings.worker().concurrency.max(1),
            idle_backoff: Duration::from_millis(settings.worker().poll_interval_ms),
            defer_delay: Duration::from_secs(settings.worker().defer_seconds),
        }
    }
}

struct InFlight {
    job_id: JobId,
    kind: JobKind,
    started: Instant,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CycleReport {
    pub(crate) reaped: usize,
    pub(crate) claimed: usize,
}

impl CycleReport {
    pub(crate) fn is_idle(self) -> bool {
        self.reaped == 0 && self.claimed == 0
    }
}

/// Pulls jobs of every kind into at most `concurrency` handler tasks and writes outcomes back.
///
/// The store row is the only record of a job; a slot lives only while its task runs.
pub(crate) struct Dispatcher {
    store: Arc<dyn JobStore>,
    handler: Arc<dyn JobHandler>,
    config: DispatcherConfig,
    tasks: JoinSet<Result<JobOutcome, HandlerError>>,
    slots: HashMap<Id, InFlight>,
}

impl Dispatcher {
    pub(crate) fn new(
        store: Arc<dyn JobStore>,
        handler: Arc<dyn JobHandler>,
        config: DispatcherConfig,
    ) -> Self {
        Self { store, handler, config, tasks: JoinSet::new(), slots: HashMap::new() }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// One poll: settle finished handlers, then claim at most one job per kind while
    /// slots are free.
    pub(crate) async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        while let Some(joined) = self.tasks.try_join_next_with_id() {
            self.settle(joined).await;
            report.reaped += 1;
        }

        for kind in JobKind::ALL {
            if self.tasks.len() >= self.config.concurrency {
                break;
            }
            match self.store.claim_one(kind).await {
                Ok(Some(job)) => {
                    self.spawn(job);
                    report.claimed += 1;
                }
                Ok(None) => {}
                Err(err) => tracing::error!(kind = %kind, error = %err, "Failed to claim job"),
            }
        }

        report
    }

    /// Waits for every in-flight handler and settles it.
    pub(crate) async fn drain(&mut self) {
        if self.in_flight() > 0 {
            tracing::info!(in_flight = self.in_flight(), "Waiting for in-flight jobs");
        }
        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.settle(joined).await;
        }
    }

    /// Recovers orphans, then polls until `shutdown` flips, then drains.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), StoreError> {
        recovery::recover_orphaned_jobs(self.store.as_ref()).await?;
        tracing::info!(concurrency = self.config.concurrency, "Dispatcher started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle().await;
            if !report.is_idle() {
                continue;
            }

            let backoff = self.config.idle_backoff;
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(joined) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => {
                    self.settle(joined).await;
                }
                _ = sleep(backoff) => {}
            }
        }

        self.drain().await;
        tracing::info!("Dispatcher stopped");
        Ok(())
    }

    fn spawn(&mut self, job: Job) {
        let job_id = job.id;
        let kind = job.kind();
        let handler = Arc::clone(&self.handler);

        metrics::counter!("queue_jobs_claimed_total", "kind" => kind.as_str()).increment(1);
        tracing::info!(job_id, kind = %kind, "Claimed job");

        let handle = self.tasks.spawn(async move { handler.handle(&job).await });
        self.slots.insert(handle.id(), InFlight { job_id, kind, started: Instant::now() });
    }

    async fn settle(&mut self, joined: Result<(Id, Result<JobOutcome, HandlerError>), JoinError>) {
        let (task_id, result) = match joined {
            Ok((task_id, result)) => (task_id, Ok(result)),
            Err(err) => (err.id(), Err(err)),
        };
        let Some(slot) = self.slots.remove(&task_id) else {
            tracing::error!(task_id = %task_id, "Finished task has no slot record");
            return;
        };
        let InFlight { job_id, kind, started } = slot;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("queue_job_duration_seconds", "kind" => kind.as_str()).record(elapsed);

        match result {
            Ok(Ok(JobOutcome::Completed)) => match self.store.complete(job_id).await {
                Ok(true) => {
                    metrics::counter!("queue_jobs_completed_total", "kind" => kind.as_str())
                        .increment(1);
                    tracing::info!(job_id, kind = %kind, duration_seconds = elapsed, "Job completed");
                }
                Ok(false) => {
                    tracing::warn!(job_id, kind = %kind, "Completed job was already removed");
                }
                Err(err) => tracing::error!(
                    job_id,
                    kind = %kind,
                    error = %err,
                    "Failed to remove completed job; it stays running until reset"
                ),
            },
            Ok(Ok(JobOutcome::Deferred { missing })) => {
                let missing = missing.iter().map(ToString::to_string).collect::<Vec<_>>();
                match self.store.defer(job_id, self.config.defer_delay).await {
                    Ok(true) => {
                        metrics::counter!("queue_jobs_deferred_total", "kind" => kind.as_str())
                            .increment(1);
                        tracing::info!(
                            job_id,
                            kind = %kind,
                            missing = ?missing,
                            delay_seconds = self.config.defer_delay.as_secs(),
                            "Job inputs not ready; deferred"
                        );
                    }
                    Ok(false) => {
                        tracing::warn!(job_id, kind = %kind, "Deferred job was already released");
                    }
                    Err(err) => tracing::error!(
                        job_id,
                        kind = %kind,
                        error = %err,
                        "Failed to defer job; it stays running until reset"
                    ),
                }
            }
            Ok(Err(err)) => {
                metrics::counter!(
                    "queue_jobs_failed_total",
                    "kind" => kind.as_str(),
                    "reason" => err.reason()
                )
                .increment(1);
                tracing::error!(
                    job_id,
                    kind = %kind,
                    error = %err,
                    "Job failed; left running until reset"
                );
            }
            Err(err) => {
                metrics::counter!(
                    "queue_jobs_failed_total",
                    "kind" => kind.as_str(),
                    "reason" => "panic"
                )
                .increment(1);
                tracing::error!(
                    job_id,
                    kind = %kind,
                    error = %err,
                    "Job handler panicked; left running until reset"
                );
            }
        }
    }
}

/// Worker process body: builds the production handlers, serves the optional observability
/// endpoint and dispatches until a shutdown signal arrives.
pub(crate) async fn run(state: AppState, storage: StorageService) -> anyhow::Result<()> {
    let content = AiGradingService::from_settings(state.settings())?;
    let store = Arc::new(state.store().clone());
    let handlers = GradingHandlers::new(store.clone(), store.clone(), Arc::new(storage), Arc::new(content));
    let shutdown = crate::core::shutdown::install();

    let server = match state.settings().worker().http_addr {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind worker HTTP on {addr}"))?;
            tracing::info!(%addr, "Worker HTTP listening");
            let app = api::router::router(state.clone());
            let mut server_shutdown = shutdown.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = server_shutdown.wait_for(|stop| *stop).await;
                    })
                    .await
            }))
        }
        None => None,
    };

    let dispatcher = Dispatcher::new(
        store,
        Arc::new(handlers),
        DispatcherConfig::from_settings(state.settings()),
    );
    let result = dispatcher.run(shutdown).await;

    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "Worker HTTP server failed"),
            Err(err) => tracing::error!(error = %err, "Worker HTTP task join failed"),
        }
    }

    result.context("Dispatcher stopped on a store error")
}

//! Scan orchestration.
//!
//! [`ScanOrchestrator::analyze`] spawns one polling task per call. The task
//! asks the [`AnalysisClient`] for the host's status until the provider
//! reports `READY` or something fails:
//!
//! | Outcome              | Action                                          |
//! |----------------------|-------------------------------------------------|
//! | transport / decode   | error on the error stream, stop                 |
//! | HTTP 429 / 529       | sleep `rate_limit_backoff`, poll again          |
//! | status `ERROR`       | provider message on the error stream, stop      |
//! | status `READY`       | cache, emit, checkpoint the cache, stop         |
//! | any other status     | cache, emit, sleep `poll_interval`, poll again  |
//!
//! Both streams close when the task stops. Cancellation is checked before
//! every poll; an in-flight request is never interrupted.
//!
//! Calls for the same host are not deduplicated here.

mod policy;

pub use policy::{ScanPolicy, Sleeper, TokioSleeper, DEFAULT_POLL_INTERVAL, DEFAULT_RATE_LIMIT_BACKOFF};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ReportCache;
use crate::client::{AnalysisClient, FetchOutcome};
use crate::error::ScanError;
use crate::model::Report;
use crate::store::ReportStore;

/// Drives analyses to completion and publishes results into the cache.
#[derive(Clone)]
pub struct ScanOrchestrator {
    client: Arc<dyn AnalysisClient>,
    cache: ReportCache,
    store: Arc<dyn ReportStore>,
    sleeper: Arc<dyn Sleeper>,
    policy: ScanPolicy,
    // Shared by clones so checkpoints land on disk in snapshot order.
    checkpoint_lock: Arc<Mutex<()>>,
}

/// A single value taken from either stream of a [`ScanHandle`].
#[derive(Debug)]
pub enum ScanEvent {
    Report(Report),
    Failed(ScanError),
}

/// Receiving side of one `analyze` invocation.
#[derive(Debug)]
pub struct ScanHandle {
    pub reports: UnboundedReceiver<Report>,
    pub errors: UnboundedReceiver<ScanError>,
    task: JoinHandle<()>,
}

impl ScanHandle {
    /// Next value from either stream, reports first. `None` once both
    /// streams are closed, which without a prior terminal value means the
    /// scan was cancelled.
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        tokio::select! {
            biased;
            Some(report) = self.reports.recv() => Some(ScanEvent::Report(report)),
            Some(err) = self.errors.recv() => Some(ScanEvent::Failed(err)),
            else => None,
        }
    }

    pub(crate) fn from_parts(
        reports: UnboundedReceiver<Report>,
        errors: UnboundedReceiver<ScanError>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            reports,
            errors,
            task,
        }
    }

    pub fn into_parts(
        self,
    ) -> (
        UnboundedReceiver<Report>,
        UnboundedReceiver<ScanError>,
        JoinHandle<()>,
    ) {
        (self.reports, self.errors, self.task)
    }
}

impl ScanOrchestrator {
    pub fn new(
        client: Arc<dyn AnalysisClient>,
        cache: ReportCache,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            client,
            cache,
            store,
            sleeper: Arc::new(TokioSleeper),
            policy: ScanPolicy::default(),
            checkpoint_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Checkpoints the current cache content.
    ///
    /// The snapshot is taken and written under one lock, so a later
    /// checkpoint never loses to an earlier one. The write itself runs on
    /// the blocking pool.
    pub async fn checkpoint(&self) {
        let _guard = self.checkpoint_lock.lock().await;
        let cache = self.cache.clone();
        let store = Arc::clone(&self.store);
        let written = tokio::task::spawn_blocking(move || store.save(&cache.snapshot())).await;
        if let Err(e) = written {
            warn!(error = %e, "checkpoint task failed");
        }
    }

    /// Starts polling `host` on a new task. Must be called inside a tokio
    /// runtime.
    pub fn analyze(&self, cancel: CancellationToken, host: impl Into<String>) -> ScanHandle {
        let host = host.into();
        let (report_tx, reports) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let this = self.clone();
        let task = tokio::spawn(async move {
            this.poll(cancel, host, report_tx, error_tx).await;
        });

        ScanHandle {
            reports,
            errors,
            task,
        }
    }

    async fn poll(
        self,
        cancel: CancellationToken,
        host: String,
        reports: UnboundedSender<Report>,
        errors: UnboundedSender<ScanError>,
    ) {
        info!(host = %host, "starting analysis");

        loop {
            if cancel.is_cancelled() {
                info!(host = %host, "analysis cancelled");
                return;
            }

            let report = match self.client.fetch(&host).await {
                Ok(FetchOutcome::Report(report)) => report,
                Ok(FetchOutcome::RateLimited(status)) => {
                    warn!(
                        host = %host,
                        status,
                        backoff_secs = self.policy.rate_limit_backoff.as_secs(),
                        "rate limited, backing off"
                    );
                    self.pause(&cancel, self.policy.rate_limit_backoff).await;
                    continue;
                }
                Err(e) => {
                    warn!(host = %host, error = %e, "analysis request failed");
                    let _ = errors.send(ScanError::Client(e));
                    return;
                }
            };

            if report.status.is_error() {
                let message = report
                    .status_message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "no details given".to_string());
                warn!(host = %host, message = %message, "provider reported an error");
                let _ = errors.send(ScanError::Provider { message });
                return;
            }

            let ready = report.status.is_ready();
            debug!(
                host = %host,
                status = %report.status,
                progress = report.progress().unwrap_or(0),
                "analysis progress"
            );

            self.cache.put(host.clone(), report.clone());
            // A dropped receiver is fine; the cache still gets every update.
            let _ = reports.send(report);

            if ready {
                info!(host = %host, "analysis complete");
                self.checkpoint().await;
                return;
            }

            self.pause(&cancel, self.policy.poll_interval).await;
        }
    }

    async fn pause(&self, cancel: &CancellationToken, duration: Duration) {
        tokio::select! {
            _ = self.sleeper.sleep(duration) => {}
            _ = cancel.cancelled() => {}
        }
    }
}

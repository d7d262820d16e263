//! Boundary operations exposed to front-ends.
//!
//! [`ScanService`] owns the cache, the store and the orchestrator and offers
//! the operations a thin HTTP or console layer needs: query a host, download
//! one rendered report, download all of them. It also keeps one scan per
//! host at most: a query for a host that is already being polled is
//! answered from the cache instead of starting a second scan.

use anyhow::Result;
use chrono::Local;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::ReportCache;
use crate::client::{AnalysisClient, GeoIpEnricher, SslLabsClient};
use crate::config::Config;
use crate::model::Report;
use crate::output::{render_all, render_report};
use crate::scan::{ScanEvent, ScanHandle, ScanOrchestrator, ScanPolicy};
use crate::store::{JsonFileStore, ReportStore};

/// Default time a query waits for the first poll result.
pub const DEFAULT_QUERY_WAIT: Duration = Duration::from_secs(2);

/// File name used by [`ScanService::download_all`].
pub const ALL_SITES_FILENAME: &str = "report_all_sites.txt";

/// Answer to a query for one host.
///
/// Serializes either as the report itself or as a bare
/// `{"status": ...}` object, matching what the provider sends.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    /// Latest known report, finished or not.
    Report(Report),
    /// A scan is running but has not produced a report yet.
    Processing,
    /// The first poll did not answer within the query wait.
    Waiting,
    /// The scan failed for good.
    Failed { message: String },
}

#[derive(Serialize)]
struct StatusBody<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

impl Serialize for QueryResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryResponse::Report(report) => report.serialize(serializer),
            QueryResponse::Processing => StatusBody {
                status: "PROCESSING",
                message: None,
            }
            .serialize(serializer),
            QueryResponse::Waiting => StatusBody {
                status: "WAITING",
                message: None,
            }
            .serialize(serializer),
            QueryResponse::Failed { message } => StatusBody {
                status: "ERROR",
                message: Some(message),
            }
            .serialize(serializer),
        }
    }
}

/// A rendered report ready to be sent as a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub body: String,
}

impl Download {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// `report_<host with dots replaced by underscores>.txt`
pub fn report_filename(host: &str) -> String {
    format!("report_{}.txt", host.replace('.', "_"))
}

pub struct ScanService {
    orchestrator: ScanOrchestrator,
    cache: ReportCache,
    in_flight: Arc<Mutex<HashSet<String>>>,
    shutdown: CancellationToken,
    query_wait: Duration,
}

impl ScanService {
    /// Restores the persisted cache and wires the orchestrator. Nothing is
    /// served before the store has been loaded.
    pub fn start(
        client: Arc<dyn AnalysisClient>,
        store: Arc<dyn ReportStore>,
        policy: ScanPolicy,
    ) -> Self {
        let cache = ReportCache::from_snapshot(store.load());
        info!(hosts = cache.len(), "scan service ready");

        let orchestrator = ScanOrchestrator::new(client, cache.clone(), store).with_policy(policy);

        Self {
            orchestrator,
            cache,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            shutdown: CancellationToken::new(),
            query_wait: DEFAULT_QUERY_WAIT,
        }
    }

    /// Builds the SSL Labs client and file store described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = SslLabsClient::new(config.api_url.clone(), config.request_timeout())?;
        if config.enrich_geo {
            client = client.with_enricher(Box::new(GeoIpEnricher::new(config.geo_api_url.clone())));
        }
        let store = JsonFileStore::new(config.store_path());

        Ok(Self::start(Arc::new(client), Arc::new(store), config.scan_policy())
            .with_query_wait(config.query_wait()))
    }

    pub fn with_query_wait(mut self, wait: Duration) -> Self {
        self.query_wait = wait;
        self
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    pub fn is_in_flight(&self, host: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(host)
    }

    /// Starts a scan for `host` unless one is already running.
    pub fn analyze(&self, host: &str) -> Option<ScanHandle> {
        let registered = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string());
        if !registered {
            debug!(host, "scan already running");
            return None;
        }

        let handle = self.orchestrator.analyze(self.shutdown.child_token(), host);
        let (reports, errors, task) = handle.into_parts();

        let in_flight = Arc::clone(&self.in_flight);
        let host = host.to_string();
        let watcher = tokio::spawn(async move {
            let _ = task.await;
            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&host);
        });

        Some(ScanHandle::from_parts(reports, errors, watcher))
    }

    /// Cached report if there is one; otherwise starts a scan and waits a
    /// bounded time for its first result before falling back to the cache.
    ///
    /// A cached report that never finished (left behind by an interrupted
    /// run) is returned as is, but polling for it resumes in the background.
    pub async fn query(&self, host: &str) -> QueryResponse {
        if let Some(report) = self.cache.get(host) {
            if report.status.is_processing() && self.analyze(host).is_some() {
                debug!(host, status = %report.status, "resuming unfinished scan");
            }
            return QueryResponse::Report(report);
        }

        let Some(mut handle) = self.analyze(host) else {
            return self.cached_or(host, QueryResponse::Processing);
        };

        match tokio::time::timeout(self.query_wait, handle.next_event()).await {
            Ok(Some(ScanEvent::Report(report))) => QueryResponse::Report(report),
            Ok(Some(ScanEvent::Failed(err))) => QueryResponse::Failed {
                message: err.to_string(),
            },
            Ok(None) => self.cached_or(host, QueryResponse::Processing),
            Err(_) => {
                debug!(host, "no result within query wait");
                self.cached_or(host, QueryResponse::Waiting)
            }
        }
    }

    /// Rendered report for one cached host.
    pub fn download(&self, host: &str) -> Option<Download> {
        let report = self.cache.get(host)?;
        Some(Download {
            filename: report_filename(host),
            body: render_report(&report),
        })
    }

    /// Rendered reports for every cached host.
    pub fn download_all(&self) -> Download {
        Download {
            filename: ALL_SITES_FILENAME.to_string(),
            body: render_all(&self.cache.snapshot(), Local::now()),
        }
    }

    /// Stops every running scan and writes a final checkpoint.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.orchestrator.checkpoint().await;
        info!("scan service stopped");
    }

    fn cached_or(&self, host: &str, fallback: QueryResponse) -> QueryResponse {
        self.cache
            .get(host)
            .map(QueryResponse::Report)
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Snapshot;
    use crate::client::FetchOutcome;
    use crate::error::ClientError;
    use crate::model::ReportStatus;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Respond(Report),
        Hang,
    }

    struct FakeClient {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AnalysisClient for FakeClient {
        async fn fetch(&self, _host: &str) -> Result<FetchOutcome, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Respond(report) => Ok(FetchOutcome::Report(report.clone())),
                Behaviour::Hang => std::future::pending().await,
            }
        }
    }

    fn service(client: Arc<FakeClient>, store: Arc<MemoryStore>) -> ScanService {
        ScanService::start(client, store, ScanPolicy::default())
            .with_query_wait(Duration::from_millis(50))
    }

    async fn wait_until_idle(svc: &ScanService, host: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while svc.is_in_flight(host) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("scan did not finish");
    }

    #[tokio::test]
    async fn test_start_restores_persisted_reports() {
        let store = Arc::new(MemoryStore::new());
        let mut saved = Snapshot::new();
        saved.insert(
            "example.com".into(),
            Report::new("example.com", ReportStatus::Ready),
        );
        store.save(&saved);

        let client = FakeClient::new(Behaviour::Hang);
        let svc = service(client.clone(), store);

        let response = svc.query("example.com").await;
        assert_eq!(
            response,
            QueryResponse::Report(Report::new("example.com", ReportStatus::Ready))
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_unknown_host_returns_first_report() {
        let client = FakeClient::new(Behaviour::Respond(Report::new(
            "example.com",
            ReportStatus::Ready,
        )));
        let store = Arc::new(MemoryStore::new());
        let svc = service(client, store.clone());

        let response = svc.query("example.com").await;
        assert!(matches!(response, QueryResponse::Report(ref r) if r.status.is_ready()));

        wait_until_idle(&svc, "example.com").await;
        assert!(svc.cache().get("example.com").is_some());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_query_provider_error() {
        let mut failed = Report::new("nope.invalid", ReportStatus::Error);
        failed.status_message = Some("Unable to resolve domain name".into());
        let svc = service(
            FakeClient::new(Behaviour::Respond(failed)),
            Arc::new(MemoryStore::new()),
        );

        match svc.query("nope.invalid").await {
            QueryResponse::Failed { message } => {
                assert!(message.contains("Unable to resolve domain name"))
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_provider_yields_waiting_and_single_scan() {
        let client = FakeClient::new(Behaviour::Hang);
        let svc = service(client.clone(), Arc::new(MemoryStore::new()));

        assert_eq!(svc.query("slow.example").await, QueryResponse::Waiting);
        assert!(svc.is_in_flight("slow.example"));

        assert_eq!(svc.query("slow.example").await, QueryResponse::Processing);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(svc.analyze("slow.example").is_none());

        svc.shutdown().await;
    }

    #[tokio::test]
    async fn test_unfinished_cached_report_resumes_polling() {
        let store = Arc::new(MemoryStore::new());
        let mut saved = Snapshot::new();
        saved.insert(
            "example.com".into(),
            Report::new("example.com", ReportStatus::Dns),
        );
        store.save(&saved);

        let client = FakeClient::new(Behaviour::Respond(Report::new(
            "example.com",
            ReportStatus::Ready,
        )));
        let svc = service(client.clone(), store);

        let response = svc.query("example.com").await;
        assert_eq!(
            response,
            QueryResponse::Report(Report::new("example.com", ReportStatus::Dns))
        );

        wait_until_idle(&svc, "example.com").await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(svc.cache().get("example.com").unwrap().status.is_ready());

        // Finished reports are served without another poll.
        svc.query("example.com").await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_download_filename_and_body() {
        let store = Arc::new(MemoryStore::new());
        let mut saved = Snapshot::new();
        saved.insert(
            "www.example.com".into(),
            Report::new("www.example.com", ReportStatus::Ready),
        );
        store.save(&saved);
        let svc = service(FakeClient::new(Behaviour::Hang), store);

        let download = svc.download("www.example.com").unwrap();
        assert_eq!(download.filename, "report_www_example_com.txt");
        assert!(download.body.contains("SSL REPORT: WWW.EXAMPLE.COM"));
        assert_eq!(
            download.content_disposition(),
            "attachment; filename=\"report_www_example_com.txt\""
        );

        assert!(svc.download("unknown.example").is_none());
    }

    #[tokio::test]
    async fn test_download_all() {
        let store = Arc::new(MemoryStore::new());
        let mut saved = Snapshot::new();
        for host in ["alpha.example", "beta.example"] {
            saved.insert(host.into(), Report::new(host, ReportStatus::Ready));
        }
        store.save(&saved);
        let svc = service(FakeClient::new(Behaviour::Hang), store);

        let download = svc.download_all();
        assert_eq!(download.filename, ALL_SITES_FILENAME);
        assert_eq!(download.body.matches("SSL REPORT: ALPHA.EXAMPLE").count(), 1);
        assert_eq!(download.body.matches("SSL REPORT: BETA.EXAMPLE").count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_checkpoints() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(FakeClient::new(Behaviour::Hang), store.clone());
        svc.cache()
            .put("example.com", Report::new("example.com", ReportStatus::Dns));

        svc.shutdown().await;

        assert_eq!(store.save_count(), 1);
        assert!(store.last_saved().unwrap().contains_key("example.com"));
    }

    #[test]
    fn test_query_response_json() {
        let waiting = serde_json::to_value(QueryResponse::Waiting).unwrap();
        assert_eq!(waiting, serde_json::json!({"status": "WAITING"}));

        let failed = serde_json::to_value(QueryResponse::Failed {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(failed, serde_json::json!({"status": "ERROR", "message": "boom"}));

        let report = serde_json::to_value(QueryResponse::Report(Report::new(
            "example.com",
            ReportStatus::Ready,
        )))
        .unwrap();
        assert_eq!(report["host"], "example.com");
        assert_eq!(report["status"], "READY");
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(report_filename("example.com"), "report_example_com.txt");
        assert_eq!(report_filename("localhost"), "report_localhost.txt");
    }
}

use super::{AnalysisClient, Enricher, FetchOutcome};
use crate::error::ClientError;
use crate::model::Report;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Public SSL Labs v3 analyze endpoint.
pub const DEFAULT_API_URL: &str = "https://api.ssllabs.com/api/v3/analyze";

/// Status codes SSL Labs uses for "too many requests" and "overloaded".
const RATE_LIMIT_CODES: [u16; 2] = [429, 529];

/// Upper bound on post-fetch enrichment. A report is returned without it
/// once this passes.
pub const DEFAULT_ENRICH_TIMEOUT: Duration = Duration::from_secs(10);

pub fn is_rate_limited(status: u16) -> bool {
    RATE_LIMIT_CODES.contains(&status)
}

pub struct SslLabsClient {
    client: reqwest::Client,
    api_url: String,
    enricher: Option<Box<dyn Enricher>>,
    enrich_timeout: Duration,
}

impl SslLabsClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            enricher: None,
            enrich_timeout: DEFAULT_ENRICH_TIMEOUT,
        })
    }

    pub fn with_enricher(mut self, enricher: Box<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_enrich_timeout(mut self, timeout: Duration) -> Self {
        self.enrich_timeout = timeout;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl AnalysisClient for SslLabsClient {
    async fn fetch(&self, host: &str) -> Result<FetchOutcome, ClientError> {
        if host.trim().is_empty() {
            return Err(ClientError::InvalidHost);
        }

        debug!(host, url = %self.api_url, "calling SSL Labs");

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("host", host), ("all", "done")])
            .send()
            .await?;

        let status = response.status().as_u16();
        if is_rate_limited(status) {
            warn!(host, status, "SSL Labs rate limit hit");
            return Ok(FetchOutcome::RateLimited(status));
        }
        if !response.status().is_success() {
            return Err(ClientError::Status(status));
        }

        let body = response.bytes().await?;
        let mut report: Report = serde_json::from_slice(&body)?;

        if let Some(enricher) = &self.enricher {
            if report.status.is_ready() {
                let mut candidate = report.clone();
                match tokio::time::timeout(self.enrich_timeout, enricher.enrich(&mut candidate)).await {
                    Ok(()) => report = candidate,
                    Err(_) => warn!(
                        host,
                        enricher = enricher.name(),
                        "enrichment timed out, returning plain report"
                    ),
                }
            }
        }

        Ok(FetchOutcome::Report(report))
    }
}

//! Access to the external analysis provider.
//!
//! The orchestrator only depends on the [`AnalysisClient`] trait; the
//! concrete SSL Labs transport lives in [`SslLabsClient`]. Optional
//! post-fetch enrichment plugs in through [`Enricher`].

mod geo;
mod ssllabs;

pub use geo::{GeoIpEnricher, DEFAULT_GEO_API_URL, DEFAULT_GEO_TIMEOUT};
pub use ssllabs::{is_rate_limited, SslLabsClient, DEFAULT_API_URL, DEFAULT_ENRICH_TIMEOUT};

use crate::error::ClientError;
use crate::model::Report;
use async_trait::async_trait;

/// Result of one successful round trip to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The provider answered with a decodable report.
    Report(Report),
    /// The provider asked us to slow down (HTTP 429 or 529).
    RateLimited(u16),
}

/// Issues a single analysis-status request for a host.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn fetch(&self, host: &str) -> Result<FetchOutcome, ClientError>;
}

/// Best-effort augmentation of a freshly fetched report.
///
/// Implementations must swallow their own failures; a report is never
/// rejected because enrichment did not work. [`SslLabsClient`] also stops
/// waiting after a fixed time and keeps the plain report.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Short label used in log fields.
    fn name(&self) -> &'static str;
    async fn enrich(&self, report: &mut Report);
}

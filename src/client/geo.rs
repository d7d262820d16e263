use super::Enricher;
use crate::model::{GeoLocation, Report};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_GEO_API_URL: &str = "http://ip-api.com/json";

/// Per-lookup limit; geolocation is cosmetic and must stay quick.
pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_secs(5);

/// Adds an approximate location to every endpoint of a report.
pub struct GeoIpEnricher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    city: String,
    isp: Option<String>,
}

impl GeoIpEnricher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_GEO_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                debug!(error = %e, "falling back to default geolocation client");
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn lookup(&self, ip: &str) -> Option<GeoLocation> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(ip, error = %e, "geolocation lookup failed");
                return None;
            }
        };

        let info: IpApiResponse = response.json().await.ok()?;
        parse_location(info)
    }
}

impl Default for GeoIpEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_GEO_API_URL)
    }
}

fn parse_location(info: IpApiResponse) -> Option<GeoLocation> {
    if info.status != "success" {
        return None;
    }
    Some(GeoLocation {
        country: info.country,
        city: info.city,
        isp: info.isp,
    })
}

#[async_trait]
impl Enricher for GeoIpEnricher {
    fn name(&self) -> &'static str {
        "ip-api.com"
    }

    async fn enrich(&self, report: &mut Report) {
        let lookups = report.endpoints.iter().map(|ep| {
            let ip = ep.ip_address.clone();
            async move {
                if ip.is_empty() {
                    None
                } else {
                    self.lookup(&ip).await
                }
            }
        });

        let locations = join_all(lookups).await;

        for (endpoint, location) in report.endpoints.iter_mut().zip(locations) {
            if location.is_some() {
                endpoint.location = location;
            }
        }
    }
}

//! AbuseIPDB reputation client.

use super::{LookupError, ReputationProvider, ReputationReport};
use crate::config::AbuseIpDbConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// AbuseIPDB success body.
#[derive(Debug, Deserialize)]
struct CheckResponse {
    data: ReputationReport,
}

/// AbuseIPDB error body.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Only `detail` is surfaced; the rest is kept for Debug output
struct ApiError {
    #[serde(default)]
    detail: String,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    source: Option<ErrorSource>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ErrorSource {
    #[serde(default)]
    parameter: Option<String>,
}

/// Client for the AbuseIPDB `check` endpoint.
pub struct AbuseIpDbClient {
    client: Client,
    url: Url,
    api_key: String,
    max_age_days: Option<u32>,
}

impl AbuseIpDbClient {
    /// Create a client whose every round trip is bounded by `timeout`.
    pub fn new(config: &AbuseIpDbConfig, timeout: Duration) -> anyhow::Result<Self> {
        let url = Url::parse(&config.url)
            .with_context(|| format!("invalid AbuseIPDB url: {}", config.url))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            max_age_days: config.max_age_days,
        })
    }
}

/// Turn a non-success response into a lookup error.
fn rejection(status: StatusCode, body: &[u8]) -> LookupError {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(parsed) => {
            let details: Vec<&str> = parsed.errors.iter().map(|e| e.detail.as_str()).collect();
            LookupError::Rejected {
                status: status.as_u16(),
                details: details.join("; "),
            }
        }
        Err(e) => LookupError::Malformed {
            status: status.as_u16(),
            reason: format!("unable to parse error response: {}", e),
        },
    }
}

#[async_trait]
impl ReputationProvider for AbuseIpDbClient {
    async fn lookup(&self, ip_address: &str) -> Result<ReputationReport, LookupError> {
        let mut request = self
            .client
            .get(self.url.clone())
            .query(&[("ipAddress", ip_address)])
            .header("Key", &self.api_key)
            .header(ACCEPT, "application/json");

        if let Some(days) = self.max_age_days {
            request = request.query(&[("maxAgeInDays", days)]);
        }

        debug!(ip_address = %ip_address, "Querying AbuseIPDB");

        let response = request.send().await.map_err(LookupError::Unavailable)?;
        let status = response.status();
        let body = response.bytes().await.map_err(LookupError::Unavailable)?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("AbuseIPDB rate limit exceeded");
        }

        if !status.is_success() {
            return Err(rejection(status, &body));
        }

        let parsed: CheckResponse =
            serde_json::from_slice(&body).map_err(|e| LookupError::Malformed {
                status: status.as_u16(),
                reason: format!("unable to parse response: {}", e),
            })?;

        debug!(
            ip_address = %ip_address,
            score = parsed.data.abuse_confidence_score,
            reports = parsed.data.total_reports,
            "AbuseIPDB lookup complete"
        );

        Ok(parsed.data)
    }

    fn name(&self) -> &str {
        "abuseipdb"
    }
}

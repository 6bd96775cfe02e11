//! IP reputation lookups.

pub mod abuseipdb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Reputation data for a single address, as reported by the upstream service.
///
/// Built fresh for every lookup and dropped once the handler has projected
/// what it needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationReport {
    pub ip_address: String,

    pub is_public: bool,

    /// 4 or 6.
    pub ip_version: u8,

    #[serde(default)]
    pub is_whitelisted: Option<bool>,

    /// Abuse confidence score (0-100, higher = worse).
    pub abuse_confidence_score: u8,

    #[serde(default)]
    pub country_code: Option<String>,

    /// Usage type (e.g., "Data Center/Web Hosting/Transit").
    #[serde(default)]
    pub usage_type: Option<String>,

    #[serde(default)]
    pub isp: Option<String>,

    #[serde(default)]
    pub domain: Option<String>,

    /// Passed through untouched; entries are not interpreted.
    #[serde(default)]
    pub hostnames: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    pub total_reports: u32,

    #[serde(default)]
    pub num_distinct_users: u32,

    #[serde(default)]
    pub last_reported_at: Option<DateTime<Utc>>,
}

/// Error from a reputation lookup.
///
/// The `Display` output is meant for operator logs only. None of it is ever
/// shown to the caller.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Transport failure or timeout; no usable response arrived.
    #[error("upstream unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),

    /// Upstream answered with a non-success status and a structured error body.
    #[error("upstream rejected request ({status}): {details}")]
    Rejected { status: u16, details: String },

    /// Upstream answered with a body we could not parse.
    #[error("upstream response malformed ({status}): {reason}")]
    Malformed { status: u16, reason: String },
}

impl LookupError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LookupError::Unavailable(e) if e.is_timeout())
    }
}

/// A service that can report on the reputation of an IP address.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    /// Look up one address. Exactly one upstream attempt is made.
    async fn lookup(&self, ip_address: &str) -> Result<ReputationReport, LookupError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_parses_full_payload() {
        let json = r#"{
            "ipAddress": "118.25.6.39",
            "isPublic": true,
            "ipVersion": 4,
            "isWhitelisted": false,
            "abuseConfidenceScore": 100,
            "countryCode": "CN",
            "usageType": "Data Center/Web Hosting/Transit",
            "isp": "Tencent Cloud Computing (Beijing) Co. Ltd",
            "domain": "tencent.com",
            "hostnames": ["a.example", {"odd": 1}],
            "totalReports": 1,
            "numDistinctUsers": 1,
            "lastReportedAt": "2018-12-20T20:55:14+00:00"
        }"#;

        let report: ReputationReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.ip_address, "118.25.6.39");
        assert_eq!(report.ip_version, 4);
        assert_eq!(report.abuse_confidence_score, 100);
        assert_eq!(report.country_code.as_deref(), Some("CN"));
        assert_eq!(report.hostnames.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            report.hostnames.as_ref().unwrap()[1],
            serde_json::json!({"odd": 1})
        );
        assert!(report.last_reported_at.is_some());
    }

    #[test]
    fn test_report_tolerates_nulls() {
        let json = r#"{
            "ipAddress": "10.0.0.1",
            "isPublic": false,
            "ipVersion": 4,
            "isWhitelisted": null,
            "abuseConfidenceScore": 0,
            "countryCode": null,
            "usageType": null,
            "isp": null,
            "domain": null,
            "hostnames": null,
            "totalReports": 0,
            "numDistinctUsers": 0,
            "lastReportedAt": null
        }"#;

        let report: ReputationReport = serde_json::from_str(json).unwrap();
        assert!(!report.is_public);
        assert!(report.isp.is_none());
        assert!(report.hostnames.is_none());
        assert!(report.last_reported_at.is_none());
    }

    #[test]
    fn test_lookup_error_display_carries_detail() {
        let err = LookupError::Rejected {
            status: 422,
            details: "The ip address must be a valid IPv4 or IPv6 address".to_string(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("must be a valid"));
        assert!(!err.is_timeout());
    }
}

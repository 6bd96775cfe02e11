//! Route handlers.
//!
//! Handlers never touch the transport. Each returns a [`HandlerOutcome`] that
//! the dispatcher in [`crate::server`] turns into a response.

use crate::auth::supplied_key;
use crate::context::AppContext;
use crate::reputation::ReputationReport;
use crate::response::HandlerOutcome;
use crate::validate::is_valid_ip_address;
use anyhow::Context;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const HOME_MESSAGE: &str = "Please make requests to the \"/ipInfo\" endpoint for ip info.";
pub const UNAUTHORIZED_MESSAGE: &str =
    "Please provide a valid API key in the \"Key\" request header.";
pub const MISSING_IP_MESSAGE: &str = "Please specify exactly one \"ipAddress\" query.";
pub const INVALID_IP_MESSAGE: &str = "Supplied IPv4 / IPv6 address is invalid.";

/// The parts of an inbound request handlers get to see.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub headers: HeaderMap,
    /// Decoded query pairs, in order, repeats kept.
    pub query: Vec<(String, String)>,
    /// Caller's observed network address, for logging.
    pub client_ip: String,
}

impl InboundRequest {
    /// The value of `name` if it appears exactly once in the query.
    pub fn single_param(&self, name: &str) -> Option<&str> {
        let mut values = self
            .query
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str());
        match (values.next(), values.next()) {
            (Some(value), None) => Some(value),
            _ => None,
        }
    }
}

/// IP info as exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpInfo {
    pub is_public: bool,
    pub ip_version: u8,
    pub country_code: String,
    pub usage_type: String,
    pub isp: String,
    pub domain: String,
    pub potential_for_abuse: u8,
    pub hostnames: Vec<serde_json::Value>,
}

impl From<ReputationReport> for PublicIpInfo {
    fn from(report: ReputationReport) -> Self {
        Self {
            is_public: report.is_public,
            ip_version: report.ip_version,
            country_code: report.country_code.unwrap_or_default(),
            usage_type: report.usage_type.unwrap_or_default(),
            isp: report.isp.unwrap_or_default(),
            domain: report.domain.unwrap_or_default(),
            potential_for_abuse: report.abuse_confidence_score,
            hostnames: report.hostnames.unwrap_or_default(),
        }
    }
}

/// `GET /`
///
/// Takes the context and request only to share the dispatcher's handler shape.
pub async fn home(_ctx: Arc<AppContext>, _request: InboundRequest) -> HandlerOutcome {
    HandlerOutcome::message(HOME_MESSAGE)
}

/// `GET /ipInfo?ipAddress=<addr>`
pub async fn ip_info(ctx: Arc<AppContext>, request: InboundRequest) -> HandlerOutcome {
    let user = match ctx.credentials.authorize(supplied_key(&request.headers)) {
        Ok(user) => user,
        Err(e) => return HandlerOutcome::unauthorized(UNAUTHORIZED_MESSAGE, e),
    };

    // Audit line tying traffic to a key.
    info!(client_ip = %request.client_ip, user = %user, "User authorized");

    let Some(ip_address) = request.single_param("ipAddress") else {
        return HandlerOutcome::bad_request(MISSING_IP_MESSAGE);
    };

    if !is_valid_ip_address(ip_address) {
        return HandlerOutcome::bad_request(INVALID_IP_MESSAGE);
    }

    info!(
        client_ip = %request.client_ip,
        ip_address = %ip_address,
        "User requested info on IP"
    );

    let report = match ctx.reputation.lookup(ip_address).await {
        Ok(report) => report,
        Err(e) => {
            let provider = ctx.reputation.name();
            if e.is_timeout() {
                warn!(
                    client_ip = %request.client_ip,
                    ip_address = %ip_address,
                    provider = %provider,
                    timeout = true,
                    "Reputation lookup timed out"
                );
            }
            return HandlerOutcome::internal(
                anyhow::Error::new(e).context(format!("{} lookup for {} failed", provider, ip_address)),
            );
        }
    };

    match serde_json::to_value(PublicIpInfo::from(report)).context("encoding ip info") {
        Ok(data) => HandlerOutcome::ok(data),
        Err(e) => HandlerOutcome::internal(e),
    }
}

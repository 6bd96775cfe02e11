use axum::{
    body::Body,
    extract::Query,
    http::{HeaderMap, Request, StatusCode},
    routing::get,
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use threat_info_gateway::response::{Envelope, GENERIC_ERROR_MESSAGE};
use threat_info_gateway::{build_app, AppContext, Config};
use tower::ServiceExt;

const PROVIDER_KEY: &str = "upstream-secret";

fn caller_key() -> String {
    "b0b".repeat(22)
}

async fn fake_abuseipdb(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if headers.get("key").and_then(|v| v.to_str().ok()) != Some(PROVIDER_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": [{"detail": "Authentication failed. Your API key is either missing, incorrect, or revoked.", "status": 401}]})),
        );
    }

    let ip = query.get("ipAddress").cloned().unwrap_or_default();
    if ip == "192.0.2.200" {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"errors": [{"detail": "Daily rate limit of 1000 requests exceeded for this endpoint.", "status": 429}]})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "data": {
                "ipAddress": ip,
                "isPublic": true,
                "ipVersion": 4,
                "isWhitelisted": null,
                "abuseConfidenceScore": 12,
                "countryCode": "DE",
                "usageType": "Data Center/Web Hosting/Transit",
                "isp": "Hetzner Online GmbH",
                "domain": "hetzner.com",
                "hostnames": ["static.1.2.3.4.clients.your-server.de"],
                "totalReports": 3,
                "numDistinctUsers": 2,
                "lastReportedAt": "2024-02-10T08:15:00+00:00"
            }
        })),
    )
}

async fn spawn_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    let app = Router::new().route("/api/v2/check", get(fake_abuseipdb));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("upstream serve");
    });
    format!("http://{}/api/v2/check", addr)
}

async fn gateway(provider_key: &str) -> Router {
    let upstream = spawn_upstream().await;
    let yaml = format!(
        r#"
http:
  timeout_seconds: 5
api_keys:
  bobby: "{}"
abuseipdb:
  url: "{}"
  api_key: "{}"
"#,
        caller_key(),
        upstream,
        provider_key
    );

    let config = Config::parse(&yaml).expect("parse config");
    config.validate().expect("valid config");
    let ctx = AppContext::from_config(&config).expect("build context");
    build_app(Arc::new(ctx))
}

async fn get_envelope(app: Router, uri: &str, key: Option<&str>) -> (StatusCode, Envelope) {
    let mut builder = Request::builder().uri(uri).header("x-real-ip", "203.0.113.50");
    if let Some(key) = key {
        builder = builder.header("Key", key);
    }

    let response = app
        .oneshot(builder.body(Body::empty()).expect("build request"))
        .await
        .expect("request should complete");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    (status, serde_json::from_slice(&bytes).expect("envelope json"))
}

#[tokio::test]
async fn ip_info_round_trips_through_real_client() {
    let app = gateway(PROVIDER_KEY).await;
    let key = caller_key();

    let (status, envelope) = get_envelope(app, "/ipInfo?ipAddress=1.2.3.4", Some(&key)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(envelope.success);
    assert_eq!(envelope.message, "");
    assert_eq!(
        envelope.data,
        Some(json!({
            "isPublic": true,
            "ipVersion": 4,
            "countryCode": "DE",
            "usageType": "Data Center/Web Hosting/Transit",
            "isp": "Hetzner Online GmbH",
            "domain": "hetzner.com",
            "potentialForAbuse": 12,
            "hostnames": ["static.1.2.3.4.clients.your-server.de"]
        }))
    );
}

#[tokio::test]
async fn repeated_requests_yield_identical_info() {
    let app = gateway(PROVIDER_KEY).await;
    let key = caller_key();

    let (_, first) = get_envelope(app.clone(), "/ipInfo?ipAddress=1.2.3.4", Some(&key)).await;
    let (_, second) = get_envelope(app, "/ipInfo?ipAddress=1.2.3.4", Some(&key)).await;

    assert!(first.success);
    assert_eq!(first, second);
}

#[tokio::test]
async fn upstream_rejection_is_hidden_from_caller() {
    let app = gateway("wrong-provider-key").await;
    let key = caller_key();

    let (status, envelope) = get_envelope(app, "/ipInfo?ipAddress=1.2.3.4", Some(&key)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!envelope.success);
    assert_eq!(envelope.message, GENERIC_ERROR_MESSAGE);
    assert!(envelope.data.is_none());
}

#[tokio::test]
async fn upstream_rate_limit_is_hidden_from_caller() {
    let app = gateway(PROVIDER_KEY).await;
    let key = caller_key();

    let (status, envelope) = get_envelope(app, "/ipInfo?ipAddress=192.0.2.200", Some(&key)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!envelope.message.contains("rate limit"));
}

#[tokio::test]
async fn auth_and_validation_short_circuit_before_upstream() {
    let app = gateway(PROVIDER_KEY).await;
    let key = caller_key();

    let (status, envelope) = get_envelope(app.clone(), "/ipInfo?ipAddress=1.2.3.4", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!envelope.success);

    let (status, _) = get_envelope(app.clone(), "/ipInfo?ipAddress=1.2.3.4", Some("bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, envelope) = get_envelope(app, "/ipInfo?ipAddress=not-an-ip", Some(&key)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!envelope.success);
}

#[tokio::test]
async fn home_needs_no_key() {
    let app = gateway(PROVIDER_KEY).await;

    let (status, envelope) = get_envelope(app, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(envelope.success);
    assert_eq!(
        envelope.message,
        "Please make requests to the \"/ipInfo\" endpoint for ip info."
    );
    assert!(envelope.data.is_none());
}

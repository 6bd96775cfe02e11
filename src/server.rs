//! HTTP surface: router, dispatcher and listener.

use crate::config::Config;
use crate::context::AppContext;
use crate::handlers::{self, InboundRequest};
use crate::response::HandlerOutcome;
use anyhow::Context;
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Headers consulted for the caller address, in order of preference.
pub const CLIENT_IP_HEADERS: [&str; 2] = ["x-real-ip", "x-forwarded-for"];

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Build the router over a shared context.
pub fn build_app(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(home_route))
        .route("/ipInfo", get(ip_info_route))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn home_route(State(ctx): State<Arc<AppContext>>, request: Request) -> Response {
    dispatch(ctx, request, handlers::home).await
}

async fn ip_info_route(State(ctx): State<Arc<AppContext>>, request: Request) -> Response {
    dispatch(ctx, request, handlers::ip_info).await
}

/// Run one handler and turn its outcome into the wire response.
///
/// Every outcome is logged with the caller address and status. Internal errors
/// go to the log only, never to the body. A handler panic becomes the generic
/// 500 envelope.
pub async fn dispatch<F, Fut>(ctx: Arc<AppContext>, request: Request, handler: F) -> Response
where
    F: FnOnce(Arc<AppContext>, InboundRequest) -> Fut,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    let inbound = inbound_request(&request);
    let client_ip = inbound.client_ip.clone();

    let outcome = guarded(handler(ctx, inbound)).await;
    respond(&client_ip, outcome)
}

fn inbound_request(request: &Request) -> InboundRequest {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    // A query that doesn't decode is treated as carrying no parameters.
    let query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();

    InboundRequest {
        headers: request.headers().clone(),
        query,
        client_ip: client_ip(request.headers(), peer),
    }
}

fn respond(client_ip: &str, outcome: HandlerOutcome) -> Response {
    let (status, err, envelope) = outcome.into_parts();
    let code = status.as_u16();
    let detail = err.map(|e| format!("{:#}", e)).unwrap_or_default();

    if status.is_server_error() {
        error!(client_ip = %client_ip, status = code, error = %detail, "Request failed");
    } else if status.is_client_error() {
        warn!(
            client_ip = %client_ip,
            status = code,
            reason = %detail,
            reply = %envelope.message,
            "Request refused"
        );
    } else {
        info!(client_ip = %client_ip, status = code, "Request served");
    }

    (status, Json(envelope)).into_response()
}

/// Aborts the task if the request future is dropped first.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run the handler future on its own task so a panic is contained.
async fn guarded<Fut>(fut: Fut) -> HandlerOutcome
where
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(fut));

    match (&mut task.0).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            HandlerOutcome::internal(anyhow::anyhow!(
                "handler panicked: {}",
                panic_message(&*payload)
            ))
        }
        Err(e) => HandlerOutcome::internal(anyhow::anyhow!("handler task failed: {}", e)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Resolve the caller address: X-Real-Ip, then X-Forwarded-For (first hop),
/// then the transport peer. First non-empty wins.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for header_name in CLIENT_IP_HEADERS {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            // X-Forwarded-For: client, proxy1, proxy2
            let candidate = value.split(',').next().unwrap_or_default().trim();
            if !candidate.is_empty() {
                return candidate.to_string();
            }
        }
    }

    peer.map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let ctx = Arc::new(AppContext::from_config(&config)?);
    let app = build_app(ctx).into_make_service_with_connect_info::<SocketAddr>();

    let bind_address = config.server.bind_address();
    let addr = tokio::net::lookup_host(bind_address.as_str())
        .await
        .with_context(|| format!("unable to resolve {}", bind_address))?
        .next()
        .with_context(|| format!("{} resolved to no addresses", bind_address))?;

    let tls = &config.server.tls;
    match (tls.enabled, &tls.cert_file, &tls.key_file) {
        (true, Some(cert_file), Some(key_file)) => {
            // Process-wide rustls provider, shared with the reqwest client.
            let _ = rustls::crypto::ring::default_provider().install_default();

            let rustls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_file, key_file)
                    .await
                    .context("unable to load TLS certificate or key")?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!(address = %addr, "Listening (TLS)");
            axum_server::bind_rustls(addr, rustls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        (true, _, _) => anyhow::bail!("TLS is enabled but cert_file or key_file is missing"),
        (false, _, _) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("unable to bind {}", addr))?;

            info!(address = %addr, "Listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

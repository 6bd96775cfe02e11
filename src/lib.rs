//! Threat Info Gateway.
//!
//! A small authenticated HTTP service that looks up an IP address on AbuseIPDB
//! and returns a normalized subset of the result.
//!
//! # Routes
//!
//! - `GET /` - informational message, no auth
//! - `GET /ipInfo?ipAddress=<addr>` - requires a `Key` header matching one of
//!   the configured API keys
//!
//! Every response, success or failure, uses the same envelope:
//!
//! ```json
//! {"success": true, "message": "", "data": {"isPublic": true, "potentialForAbuse": 0}}
//! ```
//!
//! Upstream and internal failures are logged with the caller's address and
//! reported to the caller as a generic 500.
//!
//! # Example Configuration
//!
//! ```yaml
//! log_file: "/var/log/threat-info-gateway.log"
//!
//! server:
//!   host: "0.0.0.0"
//!   port: 8080
//!
//! http:
//!   timeout_seconds: 10
//!
//! api_keys:
//!   alice: "${ALICE_API_KEY}"
//!
//! abuseipdb:
//!   api_key: "${ABUSEIPDB_API_KEY}"
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod handlers;
pub mod logging;
pub mod reputation;
pub mod response;
pub mod server;
pub mod validate;

pub use config::Config;
pub use context::AppContext;
pub use server::build_app;

//! Shared, read-only state handed to every request.

use crate::auth::CredentialMap;
use crate::config::Config;
use crate::reputation::abuseipdb::AbuseIpDbClient;
use crate::reputation::ReputationProvider;
use tracing::info;

/// Everything a request needs, built once at startup.
///
/// Nothing in here is mutated after construction, so it is shared behind an
/// `Arc` without locking.
pub struct AppContext {
    pub credentials: CredentialMap,
    pub reputation: Box<dyn ReputationProvider>,
}

impl AppContext {
    pub fn new(credentials: CredentialMap, reputation: Box<dyn ReputationProvider>) -> Self {
        Self {
            credentials,
            reputation,
        }
    }

    /// Build the context from validated configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = AbuseIpDbClient::new(&config.abuseipdb, config.http.timeout())?;
        let credentials = CredentialMap::new(config.api_keys.clone());

        info!(
            provider = client.name(),
            users = credentials.len(),
            timeout_seconds = config.http.timeout_seconds,
            "Request context initialized"
        );

        Ok(Self::new(credentials, Box::new(client)))
    }
}

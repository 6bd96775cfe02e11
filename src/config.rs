//! Configuration types for the threat info gateway.

use crate::validate::{is_strong_api_key, is_valid_username, MIN_API_KEY_LEN};
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Append logs to this file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Outbound HTTP settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Accepted callers, username -> API key.
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,

    /// AbuseIPDB upstream.
    pub abuseipdb: AbuseIpDbConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: TlsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` as used for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// TLS material for serving HTTPS.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Round-trip timeout for upstream lookups, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

/// AbuseIPDB provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbuseIpDbConfig {
    /// `check` endpoint URL.
    #[serde(default = "default_abuseipdb_url")]
    pub url: String,

    /// API key (supports ${ENV_VAR} syntax).
    pub api_key: String,

    /// Only consider reports from the last N days. Upstream default when unset.
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

fn default_abuseipdb_url() -> String {
    "https://api.abuseipdb.com/api/v2/check".to_string()
}

impl Config {
    /// Load configuration from a YAML (or JSON) file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without validating it.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Config =
            serde_yaml::from_str(&expanded).context("unable to parse config file")?;
        Ok(config)
    }

    /// Validate configuration, reporting every problem at once.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut problems = Vec::new();

        for (username, api_key) in &self.api_keys {
            if !is_valid_username(username) {
                problems.push(format!(
                    "Not a valid username: \"{}\". Usernames must be alphabetical characters and be 4 to 16 characters.",
                    username
                ));
            }

            // Never echo the key value.
            if !is_strong_api_key(api_key) {
                problems.push(format!(
                    "Not a valid API key for user \"{}\". API keys must be at least {} characters and contain only letters and numbers.",
                    username, MIN_API_KEY_LEN
                ));
            }
        }

        if self.api_keys.is_empty() {
            problems.push(
                "Please provide at least one API key under \"api_keys\". The key should be a username and the value should be a strong API key."
                    .to_string(),
            );
        }

        if self.abuseipdb.api_key.is_empty() {
            problems.push("abuseipdb.api_key is empty".to_string());
        }

        match reqwest::Url::parse(&self.abuseipdb.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => problems.push(format!(
                "abuseipdb.url is not a valid http(s) URL: {}",
                self.abuseipdb.url
            )),
        }

        if self.http.timeout_seconds == 0 {
            problems.push("http.timeout_seconds must be greater than 0".to_string());
        }

        let tls = &self.server.tls;
        if tls.enabled && (tls.cert_file.is_none() || tls.key_file.is_none()) {
            problems.push("server.tls is enabled but cert_file or key_file is missing".to_string());
        }

        if !problems.is_empty() {
            anyhow::bail!(problems.join("; "));
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Threat Info Gateway Configuration

# Logs are appended here. Omit to log to stdout only.
log_file: "/var/log/threat-info-gateway.log"

server:
  host: "0.0.0.0"
  port: 8080
  tls:
    enabled: false
    cert_file: "/etc/threat-info-gateway/cert.pem"
    key_file: "/etc/threat-info-gateway/key.pem"

http:
  timeout_seconds: 10          # Upstream lookup timeout

# Callers allowed to use /ipInfo: username -> API key.
# Usernames: 4-16 letters. Keys: at least 64 letters/digits.
api_keys:
  alice: "${ALICE_API_KEY}"

abuseipdb:
  url: "https://api.abuseipdb.com/api/v2/check"
  api_key: "${ABUSEIPDB_API_KEY}"  # Use environment variable
  # max_age_days: 90           # Only consider reports from last N days
"#
        .to_string()
    }
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern compiles"));

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

//! Ambient configuration surface: CLI flags/env vars, validated before any
//! network I/O runs. Mirrors the teacher's `clap::Parser` + env-fallback
//! style; unlike the teacher's multi-subcommand CLI this binary has exactly
//! one mode of operation, so there is no `Commands` enum.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::error::ConfigError;
use crate::snapshot::RetryParams;

const INSECURE_TLS_ACK_ENV: &str = "NBU_EXPORTER_ALLOW_INSECURE_TLS";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nbu-exporter",
    about = "Prometheus exporter for Veritas NetBackup storage and job metrics",
    version
)]
pub struct Args {
    /// Base URL of the NetBackup REST API, e.g. https://nbu-master:1556/netbackup
    #[arg(long = "base-url", env = "NBU_BASE_URL")]
    pub base_url: Url,

    /// Static API key sent as the literal `Authorization` header value.
    #[arg(long = "api-key", env = "NBU_API_KEY")]
    pub api_key: String,

    #[arg(long = "scraping-window", env = "NBU_SCRAPING_WINDOW", default_value = "1h")]
    pub scraping_window: humantime::Duration,

    #[arg(long = "storage-ttl", env = "NBU_STORAGE_TTL", default_value = "10m")]
    pub storage_ttl: humantime::Duration,

    /// Disable TLS certificate verification. Refused unless
    /// `NBU_EXPORTER_ALLOW_INSECURE_TLS=1` is also set in the environment.
    #[arg(long = "tls-insecure", env = "NBU_TLS_INSECURE", action = clap::ArgAction::SetTrue)]
    pub tls_insecure: bool,

    #[arg(long = "listen", env = "NBU_LISTEN", default_value = "0.0.0.0:9130")]
    pub listen: SocketAddr,

    #[arg(long = "exposition-path", env = "NBU_EXPOSITION_PATH", default_value = "/metrics")]
    pub exposition_path: String,

    #[arg(long = "scrape-deadline", env = "NBU_SCRAPE_DEADLINE", default_value = "2m")]
    pub scrape_deadline: humantime::Duration,

    /// Phase-3 shutdown drain timeout for the HTTP client (spec §5).
    #[arg(long = "close-drain-timeout", env = "NBU_CLOSE_DRAIN_TIMEOUT", default_value = "30s")]
    pub close_drain_timeout: humantime::Duration,

    #[arg(long = "request-timeout", env = "NBU_REQUEST_TIMEOUT", default_value = "30s")]
    pub request_timeout: humantime::Duration,

    #[arg(long = "retry-max-attempts", env = "NBU_RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: u32,

    #[arg(long = "retry-initial-backoff", env = "NBU_RETRY_INITIAL_BACKOFF", default_value = "5s")]
    pub retry_initial_backoff: humantime::Duration,

    #[arg(long = "retry-factor", env = "NBU_RETRY_FACTOR", default_value_t = 2.0)]
    pub retry_factor: f64,

    #[arg(long = "retry-max-backoff", env = "NBU_RETRY_MAX_BACKOFF", default_value = "60s")]
    pub retry_max_backoff: humantime::Duration,
}

/// Output of [`Args::validate`]: everything needed to open a short-lived
/// client for version negotiation, before a [`crate::snapshot::Snapshot`]
/// can exist (its `api_version` field is what negotiation produces).
pub struct PendingConfig {
    pub base_url: Url,
    pub api_key: String,
    pub scraping_window: Duration,
    pub storage_ttl: Duration,
    pub tls_insecure: bool,
    pub retry: RetryParams,
    pub request_timeout: Duration,
    pub listen: SocketAddr,
    pub exposition_path: String,
    pub scrape_deadline: Duration,
    pub close_drain_timeout: Duration,
}

impl Args {
    pub fn validate(self) -> Result<PendingConfig, ConfigError> {
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }

        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        positive(self.scraping_window.into(), "scraping-window")?;
        positive(self.storage_ttl.into(), "storage-ttl")?;
        positive(self.scrape_deadline.into(), "scrape-deadline")?;
        positive(self.close_drain_timeout.into(), "close-drain-timeout")?;
        positive(self.request_timeout.into(), "request-timeout")?;
        positive(self.retry_initial_backoff.into(), "retry-initial-backoff")?;
        positive(self.retry_max_backoff.into(), "retry-max-backoff")?;

        if self.tls_insecure && std::env::var(INSECURE_TLS_ACK_ENV).as_deref() != Ok("1") {
            return Err(ConfigError::InsecureTlsNotAcknowledged);
        }

        if self.retry_max_attempts < 1 {
            return Err(ConfigError::InvalidRetryParams);
        }

        Ok(PendingConfig {
            base_url: self.base_url,
            api_key: self.api_key,
            scraping_window: self.scraping_window.into(),
            storage_ttl: self.storage_ttl.into(),
            tls_insecure: self.tls_insecure,
            retry: RetryParams {
                max_attempts: self.retry_max_attempts,
                initial_backoff: self.retry_initial_backoff.into(),
                factor: self.retry_factor,
                max_backoff: self.retry_max_backoff.into(),
            },
            request_timeout: self.request_timeout.into(),
            listen: self.listen,
            exposition_path: self.exposition_path,
            scrape_deadline: self.scrape_deadline.into(),
            close_drain_timeout: self.close_drain_timeout.into(),
        })
    }
}

fn positive(d: Duration, field: &'static str) -> Result<(), ConfigError> {
    if d.is_zero() {
        return Err(ConfigError::NonPositiveDuration { field });
    }
    Ok(())
}

//! C7: immutable runtime snapshot.
//!
//! Constructed once, after configuration validation and version negotiation,
//! and shared read-only by every component for the lifetime of the process.
//! No method here takes `&mut self` — once built, a `Snapshot` cannot change
//! underneath a running scrape.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::UrlBuildError;

/// Characters left unescaped in a query value. Deliberately narrow: NetBackup's
/// `filter=endTime gt <ts>` expression expects a literal, pre-encoded `%20`
/// for the space — the default `url` crate form-encoder would emit `+`
/// instead, which NetBackup does not accept (spec §9 open question (b)).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b':');

#[derive(Debug, Clone, Copy)]
pub struct RetryParams {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub factor: f64,
    pub max_backoff: Duration,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            factor: 2.0,
            max_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    base_url: Url,
    api_key: String,
    api_version: String,
    scraping_window: Duration,
    storage_ttl: Duration,
    tls_insecure: bool,
    retry: RetryParams,
    request_timeout: Duration,
}

impl Snapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        base_url: Url,
        api_key: String,
        api_version: String,
        scraping_window: Duration,
        storage_ttl: Duration,
        tls_insecure: bool,
        retry: RetryParams,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url,
            api_key,
            api_version,
            scraping_window,
            storage_ttl,
            tls_insecure,
            retry,
            request_timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Shows at most the first and last 4 characters. Keys shorter than 8
    /// characters are fully masked rather than partially revealed.
    pub fn masked_api_key(&self) -> String {
        mask(&self.api_key)
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn scraping_window(&self) -> Duration {
        self.scraping_window
    }

    pub fn storage_ttl(&self) -> Duration {
        self.storage_ttl
    }

    pub fn tls_insecure(&self) -> bool {
        self.tls_insecure
    }

    pub fn retry_params(&self) -> RetryParams {
        self.retry
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Builds a fully-qualified request URL. `query` pairs are emitted in
    /// the given order and percent-encoded with spaces as `%20`.
    ///
    /// This is proven unreachable once `base_url` has passed startup
    /// validation; the `Result` return exists so tests can exercise the
    /// error path without needing a malformed snapshot in production.
    pub fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, UrlBuildError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| UrlBuildError(format!("base url {} cannot be a base", self.base_url)))?;
            segments.pop_if_empty();
            for segment in path.trim_matches('/').split('/') {
                if !segment.is_empty() {
                    segments.push(segment);
                }
            }
        }
        if !query.is_empty() {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, QUERY_VALUE)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&qs));
        }
        Ok(url)
    }

    /// Value of the `Accept` header for the negotiated version, unless a
    /// caller (the version negotiator) supplies an inline override.
    pub fn accept_header(&self, version_override: Option<&str>) -> String {
        let version = version_override.unwrap_or(&self.api_version);
        format!("application/vnd.netbackup+json;version={version}")
    }
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let n = chars.len();
    if n < 8 {
        return "*".repeat(n);
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[n - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(n - 8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot::new(
            Url::parse("https://nbu-master.example.com:1556/netbackup").unwrap(),
            "supersecretapikey1234".to_string(),
            "13.0".to_string(),
            Duration::from_secs(300),
            Duration::from_secs(600),
            false,
            RetryParams::default(),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn masks_long_keys_to_first_and_last_four() {
        let s = snapshot();
        let masked = s.masked_api_key();
        assert!(masked.starts_with("supe"));
        assert!(masked.ends_with("1234"));
        assert!(!masked.contains("secret"));
    }

    #[test]
    fn fully_masks_short_keys() {
        let s = Snapshot::new(
            Url::parse("https://nbu.example.com").unwrap(),
            "short".to_string(),
            "13.0".to_string(),
            Duration::from_secs(1),
            Duration::from_secs(1),
            false,
            RetryParams::default(),
            Duration::from_secs(1),
        );
        assert_eq!(s.masked_api_key(), "*****");
        assert!(!s.masked_api_key().contains('s'));
    }

    #[test]
    fn build_url_joins_path_and_preserves_pair_order() {
        let s = snapshot();
        let url = s
            .build_url(
                "/admin/jobs",
                &[
                    ("page[limit]", "100".to_string()),
                    ("filter", "endTime gt 2024-01-01T00:00:00.000Z".to_string()),
                ],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://nbu-master.example.com:1556/netbackup/admin/jobs?page[limit]=100&filter=endTime%20gt%202024-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn build_url_encodes_spaces_as_percent_20_not_plus() {
        let s = snapshot();
        let url = s
            .build_url("/admin/jobs", &[("filter", "a b".to_string())])
            .unwrap();
        assert!(url.query().unwrap().contains("a%20b"));
        assert!(!url.query().unwrap().contains('+'));
    }
}

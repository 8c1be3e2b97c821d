//! C8: tracing facade.
//!
//! `tracing::Span` is already a null object — recording on a disabled or
//! unsubscribed span is a no-op — so there is no separate "noop tracer" type
//! to construct. What this facade centralises is the span/attribute *naming
//! contract* so call sites never hand-roll a span name or attribute key, and
//! so a distributed-tracing SDK can be layered onto the `tracing_subscriber`
//! registry in `main` (out of scope here — only this contract is) without
//! any core component needing to know it exists.

use tracing::{field, Level, Span};

pub mod span_name {
    pub const SCRAPE: &str = "prometheus.scrape";
    pub const FETCH_STORAGE: &str = "netbackup.fetch_storage";
    pub const FETCH_JOBS: &str = "netbackup.fetch_jobs";
    pub const FETCH_JOB_PAGE: &str = "netbackup.fetch_job_page";
    pub const HTTP_REQUEST: &str = "http.request";
}

pub mod attr {
    pub const ENDPOINT: &str = "netbackup.endpoint";
    pub const API_VERSION: &str = "netbackup.api_version";
    pub const TIME_WINDOW: &str = "netbackup.time_window";
    pub const TOTAL_JOBS: &str = "netbackup.total_jobs";
    pub const TOTAL_PAGES: &str = "netbackup.total_pages";
    pub const PAGE_OFFSET: &str = "netbackup.page_offset";
    pub const JOBS_IN_PAGE: &str = "netbackup.jobs_in_page";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const HTTP_DURATION_MS: &str = "http.duration_ms";
    pub const SCRAPE_OUTCOME: &str = "netbackup.scrape_outcome";
}

/// Thin wrapper so call sites never construct a span ad hoc. Cloning is
/// cheap (it is a unit struct); every component holds one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracer;

impl Tracer {
    pub fn new() -> Self {
        Self
    }

    /// Always returns a valid, end-callable span — entering it is safe even
    /// with no subscriber installed.
    pub fn start_span(&self, name: &'static str) -> Span {
        match name {
            span_name::SCRAPE => tracing::span!(
                Level::INFO,
                "prometheus.scrape",
                { attr::SCRAPE_OUTCOME } = field::Empty,
            ),
            span_name::FETCH_STORAGE => tracing::span!(
                Level::INFO,
                "netbackup.fetch_storage",
                { attr::ENDPOINT } = field::Empty,
            ),
            span_name::FETCH_JOBS => tracing::span!(
                Level::INFO,
                "netbackup.fetch_jobs",
                { attr::ENDPOINT } = field::Empty,
                { attr::TIME_WINDOW } = field::Empty,
                { attr::TOTAL_JOBS } = field::Empty,
                { attr::TOTAL_PAGES } = field::Empty,
            ),
            span_name::FETCH_JOB_PAGE => tracing::span!(
                Level::DEBUG,
                "netbackup.fetch_job_page",
                { attr::PAGE_OFFSET } = field::Empty,
                { attr::JOBS_IN_PAGE } = field::Empty,
            ),
            span_name::HTTP_REQUEST => tracing::span!(
                Level::DEBUG,
                "http.request",
                { attr::HTTP_METHOD } = field::Empty,
                { attr::HTTP_URL } = field::Empty,
                { attr::HTTP_STATUS_CODE } = field::Empty,
                { attr::HTTP_DURATION_MS } = field::Empty,
            ),
            other => tracing::span!(Level::INFO, "span", name = other),
        }
    }
}

//! C6: scrape orchestrator.
//!
//! Driven once per exposition request. Storage and jobs run concurrently
//! under one [`ScrapeContext`] via `tokio::join!` — never `try_join!` — so a
//! failure in one pipeline can never cancel the other; each returns its own
//! outcome and the supervisor folds both into the emitted gauges.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::cache::StorageCache;
use crate::client::HttpClient;
use crate::jobs::{self, JobAggregates};
use crate::metrics_sink;
use crate::scrape_context::ScrapeContext;
use crate::storage;
use crate::tracing_facade::{attr, span_name, Tracer};

const DEFAULT_SCRAPE_DEADLINE: Duration = Duration::from_secs(120);

struct StorageOutcome {
    samples: Vec<crate::storage::StorageSample>,
    captured_at: Option<SystemTime>,
}

pub struct Orchestrator {
    client: Arc<HttpClient>,
    cache: StorageCache,
    tracer: Tracer,
    scrape_deadline: Duration,
}

impl Orchestrator {
    pub fn new(client: Arc<HttpClient>, cache: StorageCache, tracer: Tracer) -> Self {
        Self {
            client,
            cache,
            tracer,
            scrape_deadline: DEFAULT_SCRAPE_DEADLINE,
        }
    }

    pub fn with_scrape_deadline(mut self, deadline: Duration) -> Self {
        self.scrape_deadline = deadline;
        self
    }

    /// Runs one scrape and emits every gauge in spec §6. Returns the
    /// computed `nbu_up` value, mostly so tests can assert on it without a
    /// metrics recorder installed.
    pub async fn scrape(&self) -> bool {
        let ctx = ScrapeContext::with_timeout(self.scrape_deadline);
        let span = self.tracer.start_span(span_name::SCRAPE);
        let _enter = span.enter();

        let (storage_outcome, jobs_outcome) =
            tokio::join!(self.run_storage(ctx), self.run_jobs(ctx));

        let jobs_present = jobs_outcome
            .as_ref()
            .map(|a| !a.counts.is_empty())
            .unwrap_or(false);
        let up = !storage_outcome.samples.is_empty() || jobs_present;

        metrics_sink::emit_storage(&storage_outcome.samples);
        if let Some(aggregates) = &jobs_outcome {
            metrics_sink::emit_jobs(aggregates);
        }
        metrics_sink::emit_api_version(self.client.snapshot().api_version());
        metrics_sink::emit_up(up);
        if let Some(captured_at) = storage_outcome.captured_at {
            metrics_sink::emit_last_scrape_timestamp("storage", captured_at);
        }
        if jobs_outcome.is_some() {
            metrics_sink::emit_last_scrape_timestamp("jobs", SystemTime::now());
        }

        span.record(attr::SCRAPE_OUTCOME, if up { "ok" } else { "partial_failure" });
        up
    }

    async fn run_storage(&self, ctx: ScrapeContext) -> StorageOutcome {
        let lookup = self.cache.lookup();
        if lookup.fresh {
            return StorageOutcome {
                samples: lookup.samples,
                captured_at: lookup.captured_at,
            };
        }

        match storage::fetch_storage(&self.client, ctx, &self.tracer).await {
            Ok(samples) => {
                let now = SystemTime::now();
                self.cache.store(samples.clone());
                StorageOutcome {
                    samples,
                    captured_at: Some(now),
                }
            }
            Err(err) => {
                tracing::warn!(
                    endpoint = err.endpoint().unwrap_or("storage"),
                    error = %err,
                    "storage fetch failed"
                );
                if lookup.samples.is_empty() {
                    StorageOutcome {
                        samples: Vec::new(),
                        captured_at: None,
                    }
                } else {
                    tracing::warn!("serving stale storage cache entry, source degraded");
                    StorageOutcome {
                        samples: lookup.samples,
                        captured_at: lookup.captured_at,
                    }
                }
            }
        }
    }

    async fn run_jobs(&self, ctx: ScrapeContext) -> Option<JobAggregates> {
        let window = self.client.snapshot().scraping_window();
        match jobs::fetch_jobs(&self.client, ctx, window, &self.tracer).await {
            Ok(aggregates) => Some(aggregates),
            Err(err) => {
                tracing::warn!(
                    endpoint = err.endpoint().unwrap_or("jobs"),
                    error = %err,
                    "jobs fetch failed"
                );
                None
            }
        }
    }
}

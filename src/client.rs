//! C1: HTTP API client.
//!
//! One pooled `reqwest::Client` per process, shared by every pipeline.
//! Retries use the `backoff` crate's jittered exponential strategy; in-flight
//! accounting is a plain atomic counter bumped once per physical attempt
//! (not once per logical call — a call retried twice counts three attempts),
//! so [`HttpClient::close`] can drain accurately.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ClientError;
use crate::scrape_context::ScrapeContext;
use crate::snapshot::Snapshot;
use crate::tracing_facade::{attr, span_name, Tracer};

const BODY_PREVIEW_LEN: usize = 200;

pub struct HttpClient {
    http: reqwest::Client,
    snapshot: Arc<Snapshot>,
    tracer: Tracer,
    in_flight: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl HttpClient {
    pub fn new(snapshot: Arc<Snapshot>, tracer: Tracer) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(snapshot.request_timeout())
            .min_tls_version(reqwest::tls::Version::TLS_1_2);
        if snapshot.tls_insecure() {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().map_err(|source| ClientError::Transport {
            endpoint: "<client-build>".to_string(),
            source,
        })?;
        Ok(Self {
            http,
            snapshot,
            tracer,
            in_flight: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// GET `url`, decoding the body as `T`, under the negotiated API version.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        ctx: ScrapeContext,
        endpoint: &str,
    ) -> Result<T, ClientError> {
        self.get_json_with_version(url, ctx, endpoint, None).await
    }

    /// Same as [`Self::get_json`] but with the `Accept` version set inline
    /// rather than taken from the snapshot — used only by the version
    /// negotiator (C2), which must never write its probe version back into
    /// the live snapshot.
    pub async fn get_json_with_version<T: DeserializeOwned>(
        &self,
        url: &Url,
        ctx: ScrapeContext,
        endpoint: &str,
        version_override: Option<&str>,
    ) -> Result<T, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let retry = self.snapshot.retry_params();
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(retry.initial_backoff)
            .with_multiplier(retry.factor)
            .with_max_interval(retry.max_backoff)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt_no = 0u32;
        loop {
            attempt_no += 1;
            if ctx.is_expired() {
                return Err(ClientError::Cancelled {
                    endpoint: endpoint.to_string(),
                });
            }

            let result = self.attempt::<T>(url, endpoint, version_override).await;
            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt_no >= retry.max_attempts || !err.is_retryable() {
                        return Err(err);
                    }
                    tracing::warn!(
                        endpoint,
                        attempt = attempt_no,
                        error = %err,
                        "retrying netbackup request"
                    );
                    let delay = backoff.next_backoff().unwrap_or(retry.max_backoff);
                    let bounded = delay.min(ctx.remaining());
                    if bounded.is_zero() {
                        return Err(ClientError::Cancelled {
                            endpoint: endpoint.to_string(),
                        });
                    }
                    tokio::time::sleep(bounded).await;
                }
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &Url,
        endpoint: &str,
        version_override: Option<&str>,
    ) -> Result<T, ClientError> {
        let span = self.tracer.start_span(span_name::HTTP_REQUEST);
        let _enter = span.enter();
        span.record(attr::HTTP_METHOD, "GET");
        span.record(attr::HTTP_URL, url.as_str());

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let response = self
            .http
            .get(url.clone())
            .header(
                reqwest::header::ACCEPT,
                self.snapshot.accept_header(version_override),
            )
            .header(reqwest::header::AUTHORIZATION, self.snapshot.api_key())
            .send()
            .await;
        // Decrement happens on every exit path, success or failure.
        let response = match response {
            Ok(r) => r,
            Err(source) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return Err(ClientError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
        };

        let status = response.status();
        span.record(attr::HTTP_STATUS_CODE, status.as_u16());

        if status.as_u16() == 401 {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(ClientError::Auth {
                endpoint: endpoint.to_string(),
            });
        }

        let content_type_is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        let body = match response.text().await {
            Ok(b) => b,
            Err(source) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return Err(ClientError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
        };
        span.record(attr::HTTP_DURATION_MS, started.elapsed().as_millis() as u64);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !status.is_success() {
            return Err(ClientError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body_preview: preview(&body),
            });
        }

        let looks_json = matches!(body.trim_start().chars().next(), Some('{') | Some('['));
        if !content_type_is_json && !looks_json {
            return Err(ClientError::NonJson {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body_preview: preview(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| ClientError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Three-phase shutdown, phase 3 (spec §5): mark closed, wait for
    /// in-flight requests to drain or the timeout to elapse, then return.
    /// A second call is a no-op — the `swap` only drains once.
    pub async fn close(&self, drain_timeout: Duration) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let deadline = Instant::now() + drain_timeout;
        loop {
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    in_flight = self.in_flight.load(Ordering::SeqCst),
                    "closing http client while requests are still in-flight"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn preview(body: &str) -> String {
    let mut s: String = body.chars().take(BODY_PREVIEW_LEN).collect();
    if body.chars().count() > BODY_PREVIEW_LEN {
        s.push('…');
    }
    s
}

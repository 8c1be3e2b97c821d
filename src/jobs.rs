//! C4: jobs pipeline.
//!
//! Paginates `/admin/jobs` filtered to a trailing time window and folds
//! every job record into three keyed maps. A failure on any page aborts the
//! whole pipeline — partial aggregates are discarded, never returned.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;

use crate::client::HttpClient;
use crate::error::ClientError;
use crate::scrape_context::ScrapeContext;
use crate::tracing_facade::{attr, span_name, Tracer};
use crate::wire::Document;

const PATH: &str = "/admin/jobs";
const PAGE_LIMIT: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub action: String,
    pub policy_type: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusKey {
    pub action: String,
    pub status: String,
}

#[derive(Debug, Default)]
pub struct JobAggregates {
    pub counts: HashMap<JobKey, f64>,
    pub bytes: HashMap<JobKey, f64>,
    pub status_counts: HashMap<StatusKey, f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobAttributes {
    action: String,
    policy_type: String,
    status: i64,
    kilobytes_transferred: f64,
}

/// Opens the `netbackup.fetch_jobs` span (C8) for the whole pagination run,
/// recording `netbackup.endpoint`/`netbackup.time_window` up front and
/// `netbackup.total_jobs`/`netbackup.total_pages` once pagination completes.
/// Each page additionally opens its own `netbackup.fetch_job_page` span,
/// recording `netbackup.page_offset`/`netbackup.jobs_in_page`.
pub async fn fetch_jobs(
    client: &HttpClient,
    ctx: ScrapeContext,
    window: Duration,
    tracer: &Tracer,
) -> Result<JobAggregates, ClientError> {
    let span = tracer.start_span(span_name::FETCH_JOBS);
    let _enter = span.enter();
    span.record(attr::ENDPOINT, PATH);
    let window_str = humantime::format_duration(window).to_string();
    span.record(attr::TIME_WINDOW, window_str.as_str());

    let mut aggregates = JobAggregates {
        counts: HashMap::with_capacity(100),
        bytes: HashMap::with_capacity(100),
        status_counts: HashMap::with_capacity(50),
    };

    let filter = format!("endTime gt {}", lower_bound(window));
    let mut offset = 0u64;
    let mut total_pages: u64 = 0;
    let mut total_jobs: u64 = 0;

    loop {
        if ctx.is_expired() {
            return Err(ClientError::Cancelled {
                endpoint: PATH.to_string(),
            });
        }

        let page_span = tracer.start_span(span_name::FETCH_JOB_PAGE);
        let _page_enter = page_span.enter();
        page_span.record(attr::PAGE_OFFSET, offset);

        let url = client.snapshot().build_url(
            PATH,
            &[
                ("page[limit]", PAGE_LIMIT.to_string()),
                ("page[offset]", offset.to_string()),
                ("sort", "jobId".to_string()),
                ("filter", filter.clone()),
            ],
        )?;

        let doc: Document<JobAttributes> = client.get_json(&url, ctx, PATH).await?;

        page_span.record(attr::JOBS_IN_PAGE, doc.data.len() as u64);
        total_pages += 1;
        total_jobs += doc.data.len() as u64;

        if doc.data.is_empty() {
            break;
        }

        for resource in &doc.data {
            let attrs = &resource.attributes;
            let status = attrs.status.to_string();
            let job_key = JobKey {
                action: attrs.action.clone(),
                policy_type: attrs.policy_type.clone(),
                status: status.clone(),
            };
            let status_key = StatusKey {
                action: attrs.action.clone(),
                status,
            };
            *aggregates.counts.entry(job_key.clone()).or_insert(0.0) += 1.0;
            *aggregates.bytes.entry(job_key).or_insert(0.0) +=
                attrs.kilobytes_transferred * 1024.0;
            *aggregates.status_counts.entry(status_key).or_insert(0.0) += 1.0;
        }

        let pagination = match doc.meta {
            Some(meta) => meta.pagination,
            None => break,
        };

        // §9 open question (a): `next == 0` can mean "no more pages" on a
        // response that is both first and last, so the loop must terminate
        // on `offset == last`, never on `next` alone.
        if pagination.offset == pagination.last {
            break;
        }
        match pagination.next {
            Some(next) => offset = next,
            None => break,
        }
    }

    span.record(attr::TOTAL_JOBS, total_jobs);
    span.record(attr::TOTAL_PAGES, total_pages);

    Ok(aggregates)
}

fn lower_bound(window: Duration) -> String {
    let now = OffsetDateTime::now_utc();
    let then = now - window;
    format_iso_millis(then)
}

fn format_iso_millis(ts: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.millisecond(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RetryParams, Snapshot};
    use crate::tracing_facade::Tracer;
    use httpmock::{Method::GET, MockServer};
    use std::sync::Arc;
    use time::macros::datetime;
    use url::Url;

    fn snapshot_for(base_url: &str) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(
            Url::parse(base_url).unwrap(),
            "test-api-key-0123".to_string(),
            "13.0".to_string(),
            Duration::from_secs(300),
            Duration::from_secs(600),
            false,
            RetryParams {
                max_attempts: 1,
                ..RetryParams::default()
            },
            Duration::from_secs(5),
        ))
    }

    fn job_json(action: &str, policy_type: &str, status: i64, kb: f64) -> serde_json::Value {
        serde_json::json!({
            "attributes": {
                "action": action,
                "policyType": policy_type,
                "status": status,
                "kilobytesTransferred": kb,
            }
        })
    }

    #[test]
    fn formats_lower_bound_with_millisecond_precision() {
        let ts = datetime!(2024-01-01 00:00:00.250 UTC);
        assert_eq!(format_iso_millis(ts), "2024-01-01T00:00:00.250Z");
    }

    #[tokio::test]
    async fn aggregates_a_single_page_into_three_maps() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/admin/jobs");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "data": [
                        job_json("BACKUP", "MS-Windows", 0, 100.0),
                        job_json("BACKUP", "MS-Windows", 0, 50.0),
                        job_json("RESTORE", "MS-Windows", 1, 10.0),
                    ],
                    "meta": {"pagination": {"offset": 0, "limit": 100, "next": null, "last": 0}}
                }));
        });

        let client = HttpClient::new(snapshot_for(&server.base_url()), Tracer::new()).unwrap();
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let aggregates = fetch_jobs(&client, ctx, Duration::from_secs(3600), &Tracer::new())
            .await
            .unwrap();

        let backup_key = JobKey {
            action: "BACKUP".to_string(),
            policy_type: "MS-Windows".to_string(),
            status: "0".to_string(),
        };
        assert_eq!(aggregates.counts[&backup_key], 2.0);
        assert_eq!(aggregates.bytes[&backup_key], 150.0 * 1024.0);

        let status_key = StatusKey {
            action: "BACKUP".to_string(),
            status: "0".to_string(),
        };
        assert_eq!(aggregates.status_counts[&status_key], 2.0);
    }

    #[tokio::test]
    async fn follows_pagination_across_two_pages() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/admin/jobs")
                .query_param("page[offset]", "0");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "data": [job_json("BACKUP", "MS-Windows", 0, 10.0)],
                    "meta": {"pagination": {"offset": 0, "limit": 1, "next": 1, "last": 1}}
                }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/admin/jobs")
                .query_param("page[offset]", "1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "data": [job_json("BACKUP", "MS-Windows", 0, 20.0)],
                    "meta": {"pagination": {"offset": 1, "limit": 1, "next": null, "last": 1}}
                }));
        });

        let client = HttpClient::new(snapshot_for(&server.base_url()), Tracer::new()).unwrap();
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let aggregates = fetch_jobs(&client, ctx, Duration::from_secs(3600), &Tracer::new())
            .await
            .unwrap();

        let key = JobKey {
            action: "BACKUP".to_string(),
            policy_type: "MS-Windows".to_string(),
            status: "0".to_string(),
        };
        assert_eq!(aggregates.counts[&key], 2.0);
        assert_eq!(aggregates.bytes[&key], 30.0 * 1024.0);
    }

    #[tokio::test]
    async fn terminates_on_offset_equals_last_even_when_next_is_zero() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/admin/jobs");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "data": [job_json("BACKUP", "MS-Windows", 0, 10.0)],
                    "meta": {"pagination": {"offset": 0, "limit": 100, "next": 0, "last": 0}}
                }));
        });

        let client = HttpClient::new(snapshot_for(&server.base_url()), Tracer::new()).unwrap();
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        fetch_jobs(&client, ctx, Duration::from_secs(3600), &Tracer::new())
            .await
            .unwrap();

        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn empty_first_page_yields_empty_aggregates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/admin/jobs");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"data": []}));
        });

        let client = HttpClient::new(snapshot_for(&server.base_url()), Tracer::new()).unwrap();
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let aggregates = fetch_jobs(&client, ctx, Duration::from_secs(3600), &Tracer::new())
            .await
            .unwrap();

        assert!(aggregates.counts.is_empty());
        assert!(aggregates.bytes.is_empty());
        assert!(aggregates.status_counts.is_empty());
    }

    #[tokio::test]
    async fn aborts_and_discards_partial_results_on_page_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/admin/jobs")
                .query_param("page[offset]", "0");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "data": [job_json("BACKUP", "MS-Windows", 0, 10.0)],
                    "meta": {"pagination": {"offset": 0, "limit": 1, "next": 1, "last": 5}}
                }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/admin/jobs")
                .query_param("page[offset]", "1");
            then.status(500).body("boom");
        });

        let client = HttpClient::new(snapshot_for(&server.base_url()), Tracer::new()).unwrap();
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let result = fetch_jobs(&client, ctx, Duration::from_secs(3600), &Tracer::new()).await;
        assert!(matches!(result, Err(ClientError::Status { status: 500, .. })));
    }
}

//! C2: version negotiator.
//!
//! A pure function over a read-only client: tries each candidate wire
//! version in descending order and returns the first one the server
//! accepts. Never writes a candidate back into the live snapshot — the
//! version override travels as a parameter into [`HttpClient::get_json_with_version`],
//! one request at a time.

use serde_json::Value;

use crate::client::HttpClient;
use crate::error::{ClientError, NegotiationError};
use crate::scrape_context::ScrapeContext;

/// Highest-first. A contract, not a tunable — the server is expected to
/// support at least one of these.
pub const CANDIDATE_VERSIONS: [&str; 3] = ["13.0", "12.0", "3.0"];

const PROBE_PATH: &str = "/admin/jobs";

pub async fn negotiate_version(
    client: &HttpClient,
    ctx: ScrapeContext,
) -> Result<&'static str, NegotiationError> {
    let mut rejected = Vec::new();

    for candidate in CANDIDATE_VERSIONS {
        if ctx.is_expired() {
            return Err(NegotiationError::Cancelled);
        }

        let url = client
            .snapshot()
            .build_url(PROBE_PATH, &[("page[limit]", "1".to_string())])
            .expect("base url passed startup validation; cannot fail here");

        match client
            .get_json_with_version::<Value>(&url, ctx, PROBE_PATH, Some(candidate))
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(ClientError::Auth { .. }) => return Err(NegotiationError::Auth),
            Err(ClientError::Cancelled { .. }) => return Err(NegotiationError::Cancelled),
            Err(_other) => {
                // §4.2: 406 moves to the next candidate; so does a transient
                // error that survived the client's own retry budget — there
                // is no other version-specific signal to act on.
                rejected.push(candidate);
                continue;
            }
        }
    }

    Err(NegotiationError::AllCandidatesRejected(rejected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RetryParams, Snapshot};
    use crate::tracing_facade::Tracer;
    use httpmock::{Method::GET, MockServer};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    fn client_for(base_url: &str) -> HttpClient {
        let snapshot = Arc::new(Snapshot::new(
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
        ));
        HttpClient::new(snapshot, Tracer::new()).unwrap()
    }

    #[tokio::test]
    async fn accepts_highest_candidate_when_server_supports_it() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/admin/jobs")
                .header("accept", "application/vnd.netbackup+json;version=13.0");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"data": []}));
        });
        let client = client_for(&server.base_url());
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let version = negotiate_version(&client, ctx).await.unwrap();
        assert_eq!(version, "13.0");
    }

    #[tokio::test]
    async fn falls_back_to_next_candidate_on_406() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/admin/jobs")
                .header("accept", "application/vnd.netbackup+json;version=13.0");
            then.status(406);
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/admin/jobs")
                .header("accept", "application/vnd.netbackup+json;version=12.0");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"data": []}));
        });
        let client = client_for(&server.base_url());
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let version = negotiate_version(&client, ctx).await.unwrap();
        assert_eq!(version, "12.0");
    }

    #[tokio::test]
    async fn fails_fast_on_auth_error_without_trying_other_candidates() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/admin/jobs");
            then.status(401);
        });
        let client = client_for(&server.base_url());
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let result = negotiate_version(&client, ctx).await;
        assert!(matches!(result, Err(NegotiationError::Auth)));
        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn exhausts_all_candidates_and_reports_them() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/admin/jobs");
            then.status(406);
        });
        let client = client_for(&server.base_url());
        let ctx = ScrapeContext::with_timeout(Duration::from_secs(5));
        let result = negotiate_version(&client, ctx).await;
        match result {
            Err(NegotiationError::AllCandidatesRejected(tried)) => {
                assert_eq!(tried, CANDIDATE_VERSIONS.to_vec());
            }
            other => panic!("expected AllCandidatesRejected, got {other:?}"),
        }
    }
}

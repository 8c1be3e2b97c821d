//! Ambient HTTP exposition shell (spec §6, SPEC_FULL §10.4): the `axum`
//! router, middleware stack, and the two routes the core doesn't know
//! about — everything downstream of a request hitting the listener belongs
//! to [`crate::orchestrator::Orchestrator`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    prometheus: PrometheusHandle,
    ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, prometheus: PrometheusHandle) -> Self {
        Self {
            orchestrator,
            prometheus,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

/// `layer_timeout` bounds the whole request, not a single NetBackup call —
/// it must be sized from the orchestrator's `scrape_deadline` (plus margin
/// for response encoding), never from the per-call HTTP client timeout, or
/// this layer kills legitimately-long scrapes before the scrape's own
/// deadline (spec §4.6) gets a chance to.
pub fn router(state: AppState, exposition_path: &str, layer_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(middleware::from_fn(latency_header))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(layer_timeout))
        .layer(CompressionLayer::new());

    Router::new()
        .route(exposition_path, get(scrape_handler))
        .route("/health", get(health_handler))
        .layer(middleware)
        .with_state(state)
}

async fn scrape_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.orchestrator.scrape().await;
    (StatusCode::OK, state.prometheus.render())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "OK\n")
    } else {
        (StatusCode::OK, "OK (starting)\n")
    }
}

async fn latency_header(req: axum::extract::Request, next: Next) -> axum::response::Response {
    let start = std::time::Instant::now();
    let mut response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis();
    if let Ok(value) = HeaderValue::from_str(&elapsed_ms.to_string()) {
        response.headers_mut().insert("x-response-time-ms", value);
    }
    response
}

mod cache;
mod client;
mod config;
mod error;
mod jobs;
mod metrics_sink;
mod orchestrator;
mod scrape_context;
mod server;
mod snapshot;
mod storage;
mod tracing_facade;
mod version;
mod wire;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{eyre, Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::StorageCache;
use crate::client::HttpClient;
use crate::config::Args;
use crate::orchestrator::Orchestrator;
use crate::scrape_context::ScrapeContext;
use crate::snapshot::Snapshot;
use crate::tracing_facade::Tracer;
use crate::version::CANDIDATE_VERSIONS;

#[tokio::main]
async fn main() -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .compact();
    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .init();

    let args = Args::parse();
    let pending = match args.validate() {
        Ok(pending) => pending,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let tracer = Tracer::new();

    // Bootstrap order (spec §4.7): validate (done above) -> negotiate
    // version -> construct the immutable snapshot. The negotiation client
    // runs against a placeholder version; nothing reads it, because every
    // probe sends its own candidate inline.
    let negotiation_snapshot = Arc::new(Snapshot::new(
        pending.base_url.clone(),
        pending.api_key.clone(),
        CANDIDATE_VERSIONS[0].to_string(),
        pending.scraping_window,
        pending.storage_ttl,
        pending.tls_insecure,
        pending.retry,
        pending.request_timeout,
    ));
    let negotiation_client = HttpClient::new(negotiation_snapshot, tracer)
        .wrap_err("building negotiation http client")?;
    let negotiation_ctx = ScrapeContext::with_timeout(pending.scrape_deadline);
    let api_version = version::negotiate_version(&negotiation_client, negotiation_ctx)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "version negotiation failed");
            err
        })
        .wrap_err("negotiating netbackup api version")?;
    tracing::info!(api_version, "negotiated netbackup api version");

    let snapshot = Arc::new(Snapshot::new(
        pending.base_url,
        pending.api_key,
        api_version.to_string(),
        pending.scraping_window,
        pending.storage_ttl,
        pending.tls_insecure,
        pending.retry,
        pending.request_timeout,
    ));
    let client = Arc::new(HttpClient::new(snapshot, tracer).wrap_err("building http client")?);
    let cache = StorageCache::new(pending.storage_ttl);
    let orchestrator = Arc::new(
        Orchestrator::new(client.clone(), cache, tracer).with_scrape_deadline(pending.scrape_deadline),
    );

    let prom_recorder = PrometheusBuilder::new().build_recorder();
    let prom_handle = prom_recorder.handle();
    metrics::set_global_recorder(prom_recorder)
        .map_err(|err| eyre!("installing global metrics recorder: {err}"))?;

    let state = server::AppState::new(orchestrator, prom_handle);
    state.mark_ready();
    // Margin over the scrape deadline for response encoding, not the
    // per-NetBackup-call request timeout — see server::router's doc comment.
    let layer_timeout = pending.scrape_deadline + Duration::from_secs(10);
    let router = server::router(state, &pending.exposition_path, layer_timeout);

    let listener = tokio::net::TcpListener::bind(pending.listen)
        .await
        .wrap_err("binding http listener")?;
    tracing::info!(listen = %pending.listen, path = %pending.exposition_path, "serving metrics");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("serving http")?;

    // Three-phase shutdown (spec §5): 1) the exposition server above has
    // already stopped accepting new connections and let in-flight scrapes
    // finish; 2) there is no external tracing SDK to flush (out of core
    // scope, spec §1); 3) drain the HTTP client.
    client.close(pending.close_drain_timeout).await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

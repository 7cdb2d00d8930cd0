//! HTTP server initialization and runtime setup.
//!
//! Handles metrics, counter store and tracer provider setup, background
//! monitors, and the Axum server lifecycle.

use crate::application::services::{
    IdentityService, LatencyTracker, RateLimiter, SpanTracer, StructuredLogger, TracingSink,
};
use crate::config::Config;
use crate::error::configure_stack_exposure;
use crate::infrastructure::audit::LogAuditStore;
use crate::infrastructure::counter_store::{self, CounterStore, MemoryCounterStore};
use crate::infrastructure::memory_probe::ProcMemoryProbe;
use crate::infrastructure::metrics;
use crate::infrastructure::telemetry::{self, TRACER_NAME};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use opentelemetry::trace::TracerProvider as _;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Interval between heap readings; 60 readings cover one hour.
pub const LEAK_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between sweeps of expired in-memory rate-limit windows.
pub const COUNTER_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Prometheus recorder
/// - Structured logger, latency tracker and span tracer
/// - OpenTelemetry tracer provider (OTLP batch export when configured)
/// - Redis counter store (or in-memory fallback)
/// - Heap growth monitor
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - The metrics recorder cannot be installed
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    configure_stack_exposure(!config.is_production());

    let metrics_handle =
        metrics::install_recorder().context("Failed to install Prometheus recorder")?;
    tracing::info!("Metrics recorder installed");

    let logger = StructuredLogger::new(Arc::new(TracingSink), config.log_excluded_paths.clone());

    let latency = Arc::new(LatencyTracker::new(
        config.latency_tracker_config(),
        Arc::new(ProcMemoryProbe),
        logger.clone(),
    ));

    let tracer_provider = telemetry::init_tracer_provider(
        config.otlp_endpoint.as_deref(),
        config.trace_sample_ratio,
        config.span_queue_capacity,
    )
    .context("Failed to build tracer provider")?;
    let tracer = Arc::new(SpanTracer::new(tracer_provider.tracer(TRACER_NAME)));

    let (store, memory_store): (Arc<dyn CounterStore>, Option<Arc<MemoryCounterStore>>) =
        match &config.redis_url {
            Some(redis_url) => counter_store::connect_or_fallback(redis_url).await,
            None => {
                tracing::info!("Redis not configured, rate limits use in-memory counters");
                let memory = Arc::new(MemoryCounterStore::new());
                (memory.clone(), Some(memory))
            }
        };

    if let Some(memory) = memory_store {
        tokio::spawn(purge_expired_windows(memory));
    }
    tokio::spawn(monitor_heap_growth(latency.clone(), logger.clone()));

    let identity = Arc::new(IdentityService::new(config.jwt_secret.clone()));
    if !identity.is_enabled() {
        tracing::info!("JWT_SECRET not set, requests are treated as anonymous");
    }

    let limiter = Arc::new(RateLimiter::new(
        config.general_rate_limit(),
        store.clone(),
        logger.clone(),
    ));
    tokio::spawn(purge_expired_windows(limiter.fallback_store()));

    let state = AppState::new(
        logger,
        latency,
        tracer,
        identity,
        store,
        Arc::new(LogAuditStore),
    )
    .with_metrics(metrics_handle);

    let app = app_router(state, limiter);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Err(e) = tracer_provider.shutdown() {
        tracing::warn!("Tracer provider shutdown failed: {}", e);
    }

    tracing::info!("Server stopped");

    Ok(())
}

/// Takes a heap reading every [`LEAK_CHECK_INTERVAL`] and warns on sustained growth.
async fn monitor_heap_growth(latency: Arc<LatencyTracker>, logger: StructuredLogger) {
    let mut interval = tokio::time::interval(LEAK_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let signal = latency.check_leak();
        if signal.is_leaking {
            logger.warn(
                "Potential memory leak detected",
                json!({
                    "growthMB": signal.growth_mb,
                    "growthPercent": signal.growth_percent,
                }),
            );
        }
    }
}

async fn purge_expired_windows(store: Arc<MemoryCounterStore>) {
    let mut interval = tokio::time::interval(COUNTER_PURGE_INTERVAL);
    loop {
        interval.tick().await;
        let purged = store.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired rate limit windows");
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use jsonwebtoken::{EncodingKey, Header, encode};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use telehealth_gateway::application::services::{
    IdentityService, LatencyTracker, LatencyTrackerConfig, MemorySink, RateLimitConfig,
    RateLimiter, SpanTracer, StructuredLogger,
};
use telehealth_gateway::domain::{
    AuditEntry, AuditError, AuditStore, MemoryProbe, MemorySnapshot,
};
use telehealth_gateway::infrastructure::counter_store::MemoryCounterStore;
use telehealth_gateway::infrastructure::telemetry::{TRACER_NAME, provider_builder};
use telehealth_gateway::routes::build_router;
use telehealth_gateway::state::AppState;

pub const JWT_SECRET: &str = "test-jwt-secret";

/// Memory probe returning a fixed reading.
pub struct FixedProbe(pub MemorySnapshot);

impl MemoryProbe for FixedProbe {
    fn snapshot(&self) -> MemorySnapshot {
        self.0
    }
}

/// Audit store keeping every entry.
#[derive(Default)]
pub struct RecordingAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditStore {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Waits for the spawned append tasks to land.
    pub async fn wait_for(&self, count: usize) -> Vec<AuditEntry> {
        for _ in 0..100 {
            let entries = self.entries();
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.entries()
    }
}

#[async_trait]
impl AuditStore for RecordingAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// Fully wired gateway with in-memory collaborators.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub logs: Arc<MemorySink>,
    pub spans: InMemorySpanExporter,
    pub provider: SdkTracerProvider,
    pub counters: Arc<MemoryCounterStore>,
    pub audit: Arc<RecordingAuditStore>,
}

impl TestApp {
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    pub fn find_span(&self, name: &str) -> Option<SpanData> {
        self.finished_spans().into_iter().find(|s| s.name == name)
    }
}

pub fn test_memory() -> MemorySnapshot {
    MemorySnapshot {
        heap_used_bytes: 64 * 1024 * 1024,
        heap_total_bytes: 128 * 1024 * 1024,
        external_bytes: 4 * 1024 * 1024,
        rss_bytes: 256 * 1024 * 1024,
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(
        RateLimitConfig::general(Duration::from_secs(60), 100),
        LatencyTrackerConfig::default(),
    )
}

pub fn create_test_app_with(limit: RateLimitConfig, latency: LatencyTrackerConfig) -> TestApp {
    let logs = Arc::new(MemorySink::new());
    let logger = StructuredLogger::new(
        logs.clone(),
        vec!["/health".to_string(), "/metrics".to_string()],
    );

    let spans = InMemorySpanExporter::default();
    let provider = provider_builder(1.0)
        .with_simple_exporter(spans.clone())
        .build();
    let tracer = Arc::new(SpanTracer::new(provider.tracer(TRACER_NAME)));

    let latency = Arc::new(LatencyTracker::new(
        latency,
        Arc::new(FixedProbe(test_memory())),
        logger.clone(),
    ));

    let counters = Arc::new(MemoryCounterStore::new());
    let audit = Arc::new(RecordingAuditStore::default());

    let state = AppState::new(
        logger.clone(),
        latency,
        tracer,
        Arc::new(IdentityService::new(Some(JWT_SECRET.to_string()))),
        counters.clone(),
        audit.clone(),
    );

    let limiter = Arc::new(RateLimiter::new(limit, counters.clone(), logger));
    let server = TestServer::new(build_router(state.clone(), limiter)).unwrap();

    TestApp {
        server,
        state,
        logs,
        spans,
        provider,
        counters,
        audit,
    }
}

/// Builds an HS256 token over `claims`.
pub fn sign_token(secret: &str, claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

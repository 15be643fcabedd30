// src/fetch/mod.rs
//! Fetch stage: fan out one retrieval per enabled source, join all, keep the
//! successes. A failing source never aborts or delays the others; it is
//! dropped from the cycle and surfaced as a warning carrying its failure
//! kind.

pub mod http;

pub use http::HttpFetcher;

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::parse::RawDescriptor;
use crate::sources::{Source, SourceUpdate};

/// One-time metrics registration for the fetch stage.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "fetch_descriptors_total",
            "Raw descriptors retrieved across all sources."
        );
        describe_counter!("fetch_errors_total", "Per-source fetch failures.");
        describe_gauge!(
            "fetch_last_cycle_ts",
            "Unix ts when the fetch stage last completed."
        );
    });
}

/// Per-source fetch failure taxonomy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("remote returned HTTP {status}")]
    Remote { status: u16 },
    #[error("retrieval exceeded the source timeout")]
    Timeout,
    #[error("transport fault: {0}")]
    Transport(String),
    #[error("decode failure: {0}")]
    Decode(String),
}

impl FetchError {
    /// Stable kind label used in warnings and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Remote { .. } => "RemoteError",
            FetchError::Timeout => "Timeout",
            FetchError::Transport(_) => "TransportError",
            FetchError::Decode(_) => "DecodeError",
        }
    }
}

/// Retrieval seam. The production implementation is [`HttpFetcher`]; tests
/// inject stubs.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// One retrieval of `source.url`, decoded per `source.kind`. A success
    /// with zero descriptors is distinct from a failure.
    async fn fetch(&self, source: &Source) -> Result<Vec<RawDescriptor>, FetchError>;
}

/// Everything one fetch cycle produced. `updates` is the explicit mutation
/// set for the registry; coordinator tasks never touch shared state.
#[derive(Debug, Default)]
pub struct FetchCycle {
    /// Raw descriptors per source name, successes only.
    pub results: HashMap<String, Vec<RawDescriptor>>,
    pub updates: Vec<SourceUpdate>,
    pub warnings: Vec<String>,
}

impl FetchCycle {
    pub fn descriptor_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// All raw descriptors of the cycle, grouped by source, source groups in
    /// no particular order.
    pub fn into_descriptors(self) -> Vec<RawDescriptor> {
        self.results.into_values().flatten().collect()
    }
}

/// Fans out fetches across sources and joins the terminal states.
pub struct FetchCoordinator {
    fetcher: Arc<dyn Fetch>,
}

impl FetchCoordinator {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    /// Fetch every enabled source concurrently. Each task is bounded by the
    /// source's own timeout; a task still running at its deadline is
    /// abandoned and reported as `Timeout` without holding up the join.
    pub async fn fetch_all(&self, sources: &[Source]) -> FetchCycle {
        ensure_metrics_described();

        let mut handles = Vec::with_capacity(sources.len());
        for source in sources.iter().filter(|s| s.enabled) {
            let fetcher = Arc::clone(&self.fetcher);
            let source = source.clone();
            handles.push(tokio::spawn(async move {
                let outcome = match tokio::time::timeout(source.timeout(), fetcher.fetch(&source))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout),
                };
                (source, outcome)
            }));
        }

        let mut cycle = FetchCycle::default();
        for handle in handles {
            match handle.await {
                Ok((source, Ok(descriptors))) => {
                    tracing::info!(
                        source = %source.name,
                        count = descriptors.len(),
                        "fetched descriptors"
                    );
                    counter!("fetch_descriptors_total").increment(descriptors.len() as u64);
                    cycle.updates.push(SourceUpdate {
                        name: source.name.clone(),
                        fetched_at: Utc::now(),
                        config_count: descriptors.len() as u64,
                    });
                    cycle.results.insert(source.name, descriptors);
                }
                Ok((source, Err(err))) => {
                    tracing::warn!(source = %source.name, kind = err.kind(), error = %err, "fetch failed");
                    counter!("fetch_errors_total").increment(1);
                    cycle
                        .warnings
                        .push(format!("Fetch failed for {}: {}", source.name, err.kind()));
                }
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "fetch task panicked");
                    counter!("fetch_errors_total").increment(1);
                    cycle
                        .warnings
                        .push(format!("Fetch task failure: {join_err}"));
                }
            }
        }

        gauge!("fetch_last_cycle_ts").set(Utc::now().timestamp().max(0) as f64);
        cycle
    }
}

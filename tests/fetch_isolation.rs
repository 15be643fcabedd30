// tests/fetch_isolation.rs
// One slow source must never delay or poison the rest of the cycle.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use proxy_coverage_analyzer::fetch::{Fetch, FetchCoordinator, FetchError};
use proxy_coverage_analyzer::parse::RawDescriptor;
use proxy_coverage_analyzer::sources::{Source, SourceKind};

/// Succeeds for every source except `beta`, which hangs far past any timeout.
struct SlowBetaFetcher;

#[async_trait]
impl Fetch for SlowBetaFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawDescriptor>, FetchError> {
        if source.name == "beta" {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("beta must be abandoned at its timeout");
        }
        Ok(vec![RawDescriptor::line(
            &source.name,
            format!("vmess://{}", source.name),
        )])
    }
}

fn source(name: &str, timeout_secs: u64) -> Source {
    let mut s = Source::new(name, format!("https://{name}.example/sub"), SourceKind::Plain);
    s.timeout_secs = timeout_secs;
    s
}

#[tokio::test(start_paused = true)]
async fn timing_out_source_is_omitted_and_warned() {
    let sources = vec![source("alpha", 1), source("beta", 1), source("gamma", 1)];
    let coordinator = FetchCoordinator::new(Arc::new(SlowBetaFetcher));

    let cycle = coordinator.fetch_all(&sources).await;

    assert!(cycle.results.contains_key("alpha"));
    assert!(cycle.results.contains_key("gamma"));
    assert!(!cycle.results.contains_key("beta"));

    assert_eq!(cycle.warnings.len(), 1);
    assert!(cycle.warnings[0].contains("beta"));
    assert!(cycle.warnings[0].contains("Timeout"));

    // Only the successful sources produce registry updates.
    let updated: Vec<_> = cycle.updates.iter().map(|u| u.name.as_str()).collect();
    assert!(updated.contains(&"alpha"));
    assert!(updated.contains(&"gamma"));
    assert!(!updated.contains(&"beta"));
}

#[tokio::test(start_paused = true)]
async fn mixed_failure_kinds_surface_per_source() {
    struct MixedFetcher;

    #[async_trait]
    impl Fetch for MixedFetcher {
        async fn fetch(&self, source: &Source) -> Result<Vec<RawDescriptor>, FetchError> {
            match source.name.as_str() {
                "remote" => Err(FetchError::Remote { status: 502 }),
                "garbled" => Err(FetchError::Decode("base64: bad input".into())),
                _ => Ok(vec![RawDescriptor::line(&source.name, "ss://ok")]),
            }
        }
    }

    let sources = vec![source("remote", 5), source("garbled", 5), source("fine", 5)];
    let cycle = FetchCoordinator::new(Arc::new(MixedFetcher))
        .fetch_all(&sources)
        .await;

    assert_eq!(cycle.results.len(), 1);
    assert!(cycle.results.contains_key("fine"));
    assert!(cycle
        .warnings
        .iter()
        .any(|w| w.contains("remote") && w.contains("RemoteError")));
    assert!(cycle
        .warnings
        .iter()
        .any(|w| w.contains("garbled") && w.contains("DecodeError")));
}

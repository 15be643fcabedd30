//! Proxy Coverage Analyzer — Binary Entrypoint
//! Runs one source-fetch-and-validate cycle and reports coverage.
//!
//! Configuration is environment-driven (argument parsing stays with the
//! outer automation):
//!   - `SOURCES_PATH`   sources definition file (default `config/sources.toml`)
//!   - `RULES_PATH`     optional filter rules JSON
//!   - `REPORT_JSON`    optional JSON export path
//!   - `REPORT_CSV`     optional CSV export path
//!
//! Exit code 0 only when the run completed with zero invalid records.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use proxy_coverage_analyzer::fetch::HttpFetcher;
use proxy_coverage_analyzer::pipeline::run_cycle;
use proxy_coverage_analyzer::rules::{load_rules, FilterEngine};
use proxy_coverage_analyzer::sources::SourceRegistry;
use proxy_coverage_analyzer::{report, workflow};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("proxy_coverage_analyzer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().map(PathBuf::from)
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let sources_path =
        env_path("SOURCES_PATH").unwrap_or_else(|| PathBuf::from("config/sources.toml"));

    let mut registry = match SourceRegistry::load(&sources_path) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(path = %sources_path.display(), error = %e, "cannot load sources");
            std::process::exit(1);
        }
    };

    // Filter rules are optional; entry-level problems are warnings, not fatal.
    let filter = match env_path("RULES_PATH") {
        Some(path) => match load_rules(&path) {
            Ok((rules, errors)) => {
                for err in &errors {
                    tracing::warn!(error = %err, "skipping malformed rule");
                }
                Some(FilterEngine::new(&rules))
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "cannot load rules");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let run = run_cycle(&mut registry, Arc::new(HttpFetcher::new()), filter.as_ref()).await;

    print!("{}", report::render_console(&run.report));

    if let Some(path) = env_path("REPORT_JSON") {
        if let Err(e) = report::export_json(&run.report, &path) {
            tracing::error!(error = %e, "JSON export failed");
        }
    }
    if let Some(path) = env_path("REPORT_CSV") {
        if let Err(e) = report::export_csv(&run.report, &path) {
            tracing::error!(error = %e, "CSV export failed");
        }
    }

    let summary = report::summary_markdown(&run.report, run.status);
    if let Err(e) = workflow::publish(run.status.is_success(), &summary) {
        tracing::warn!(error = %e, "workflow publish failed");
    }

    std::process::exit(run.status.exit_code());
}

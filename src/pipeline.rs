// src/pipeline.rs
//! One analysis cycle: snapshot → fetch → parse → validate → aggregate.
//!
//! Failures local to one source or one record are isolated into warnings;
//! the only fatal condition is total absence of usable input. A completed
//! run with invalid records still fails the quality gate at the exit level.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::coverage::{aggregate, CoverageReport};
use crate::fetch::{Fetch, FetchCoordinator};
use crate::parse::{parse, ProtocolRecord};
use crate::rules::FilterEngine;
use crate::sources::SourceRegistry;
use crate::validate::{validate, ValidationOutcome};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("analyze_records_total", "Records parsed per cycle.");
        describe_counter!("analyze_valid_total", "Records that passed validation.");
        describe_counter!("analyze_invalid_total", "Records that failed validation.");
        describe_gauge!("analyze_last_run_ts", "Unix ts when an analysis cycle last ran.");
    });
}

/// Terminal state of one run as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Everything processed, zero invalid records.
    Passed,
    /// Processing completed, but one or more records failed validation.
    QualityGateFailed,
    /// No enabled sources, or the cycle produced nothing to analyze.
    NoUsableInput,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::QualityGateFailed => "quality gate not met",
            RunStatus::NoUsableInput => "no usable input",
        }
    }
}

/// Output of one cycle: the report plus the validated record set handed to
/// the downstream artifact generator.
#[derive(Debug)]
pub struct AnalysisRun {
    pub status: RunStatus,
    pub report: CoverageReport,
    pub outcomes: Vec<ValidationOutcome>,
    /// Records that passed validation (and the filter rules, when given).
    pub valid_records: Vec<ProtocolRecord>,
}

/// Run one full cycle over the registry's enabled sources. Fetch-stage
/// mutations flow back into the registry through its single update path.
pub async fn run_cycle(
    registry: &mut SourceRegistry,
    fetcher: Arc<dyn Fetch>,
    filter: Option<&FilterEngine>,
) -> AnalysisRun {
    ensure_metrics_described();

    let snapshot = registry.enabled_sources();
    if snapshot.is_empty() {
        tracing::warn!("no enabled sources configured");
        return AnalysisRun {
            status: RunStatus::NoUsableInput,
            report: aggregate(&[], vec!["No enabled sources configured".to_string()]),
            outcomes: Vec::new(),
            valid_records: Vec::new(),
        };
    }

    let coordinator = FetchCoordinator::new(fetcher);
    let cycle = coordinator.fetch_all(&snapshot).await;
    registry.apply_updates(&cycle.updates);

    let fetched_sources = cycle.results.len();
    tracing::info!(
        sources = snapshot.len(),
        fetched = fetched_sources,
        descriptors = cycle.descriptor_count(),
        "fetch stage complete"
    );
    let warnings = cycle.warnings.clone();
    let descriptors = cycle.into_descriptors();

    // Parse and validate are pure and per-record; a plain fold is enough.
    let outcomes: Vec<ValidationOutcome> = descriptors
        .iter()
        .map(|raw| validate(parse(raw)))
        .collect();

    counter!("analyze_records_total").increment(outcomes.len() as u64);
    let report = aggregate(&outcomes, warnings);
    counter!("analyze_valid_total").increment(report.valid_count as u64);
    counter!("analyze_invalid_total").increment(report.invalid_count as u64);
    gauge!("analyze_last_run_ts").set(report.generated_at.timestamp().max(0) as f64);

    let status = if report.total_configs == 0 {
        RunStatus::NoUsableInput
    } else if report.invalid_count > 0 {
        RunStatus::QualityGateFailed
    } else {
        RunStatus::Passed
    };

    let mut valid_records: Vec<ProtocolRecord> = outcomes
        .iter()
        .filter(|o| o.valid)
        .map(|o| o.record.clone())
        .collect();
    if let Some(engine) = filter {
        valid_records = engine.filter_records(valid_records);
    }

    tracing::info!(
        sources = snapshot.len(),
        fetched = fetched_sources,
        total = report.total_configs,
        valid = report.valid_count,
        invalid = report.invalid_count,
        status = status.describe(),
        "analysis cycle finished"
    );

    AnalysisRun {
        status,
        report,
        outcomes,
        valid_records,
    }
}

// src/coverage.rs
//! Coverage aggregation: reduce a set of validation outcomes into one report.
//!
//! Aggregation is a pure fold — same outcomes in, same counts out, in any
//! order. Only the `warnings` sequence is order-sensitive (it preserves
//! production order, no deduplication).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::parse::ProtocolKind;
use crate::validate::ValidationOutcome;

/// Count and share of one protocol kind within the recognized set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProtocolCoverage {
    pub count: usize,
    /// Share of all recognized-kind outcomes, percent, 2 decimal places.
    pub percentage: f64,
}

/// Aggregate result of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub generated_at: DateTime<Utc>,
    pub total_configs: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    /// Always enumerates all seven recognized kinds, zero counts included.
    /// Unknown-kind outcomes count toward `total_configs` only.
    pub per_protocol: BTreeMap<ProtocolKind, ProtocolCoverage>,
    pub warnings: Vec<String>,
}

impl CoverageReport {
    /// Valid share of all checked configs, percent, 2 decimal places.
    pub fn success_rate(&self) -> f64 {
        if self.total_configs == 0 {
            return 0.0;
        }
        round2(self.valid_count as f64 / self.total_configs as f64 * 100.0)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Fold outcomes into a report. `stage_warnings` carries the non-fatal
/// fetch/parse warnings accumulated earlier in the cycle; validation issue
/// warnings are appended after them, in outcome order.
pub fn aggregate(outcomes: &[ValidationOutcome], stage_warnings: Vec<String>) -> CoverageReport {
    let total_configs = outcomes.len();
    let mut valid_count = 0;
    let mut invalid_count = 0;
    let mut counts: BTreeMap<ProtocolKind, usize> = ProtocolKind::RECOGNIZED
        .iter()
        .map(|k| (*k, 0usize))
        .collect();
    let mut warnings = stage_warnings;

    for outcome in outcomes {
        if outcome.valid {
            valid_count += 1;
        } else {
            invalid_count += 1;
            warnings.push(format!(
                "Config validation issues: {}",
                outcome.issues.join(", ")
            ));
        }
        if let Some(slot) = counts.get_mut(&outcome.record.kind) {
            *slot += 1;
        }
    }

    let recognized_total: usize = counts.values().sum();
    let per_protocol = counts
        .into_iter()
        .map(|(kind, count)| {
            let percentage = if recognized_total > 0 {
                round2(count as f64 / recognized_total as f64 * 100.0)
            } else {
                0.0
            };
            (kind, ProtocolCoverage { count, percentage })
        })
        .collect();

    CoverageReport {
        generated_at: Utc::now(),
        total_configs,
        valid_count,
        invalid_count,
        per_protocol,
        warnings,
    }
}

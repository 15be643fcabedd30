// src/report.rs
//! Report rendering and export: console text, JSON, CSV, and the markdown
//! block handed to the automation collaborator.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::coverage::CoverageReport;
use crate::pipeline::RunStatus;

const BAR_WIDTH: usize = 30;
const MAX_CONSOLE_WARNINGS: usize = 10;

/// Human-readable console report.
pub fn render_console(report: &CoverageReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(70);
    let thin = "-".repeat(70);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, " Protocol Coverage Report");
    let _ = writeln!(out, " Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "{rule}");

    let _ = writeln!(out, "\nSUMMARY");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(out, "  Total Configurations:      {}", report.total_configs);
    let _ = writeln!(out, "  Valid Configurations:      {}", report.valid_count);
    let _ = writeln!(out, "  Invalid Configurations:    {}", report.invalid_count);
    let _ = writeln!(out, "  Success Rate:              {}%", report.success_rate());

    let _ = writeln!(out, "\nPROTOCOL COVERAGE");
    let _ = writeln!(out, "{thin}");

    // Highest count first, like the original report tool.
    let mut rows: Vec<_> = report.per_protocol.iter().collect();
    rows.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(b.0)));
    for (kind, stats) in &rows {
        let filled = ((stats.percentage / 100.0) * BAR_WIDTH as f64) as usize;
        let bar = format!(
            "{}{}",
            "█".repeat(filled.min(BAR_WIDTH)),
            "░".repeat(BAR_WIDTH.saturating_sub(filled))
        );
        let _ = writeln!(
            out,
            "  {:<12} {} {:>6} ({:>5.1}%)",
            kind.as_str().to_uppercase(),
            bar,
            stats.count,
            stats.percentage
        );
    }
    let covered = rows.iter().filter(|(_, s)| s.count > 0).count();
    let _ = writeln!(out, "\n  Protocols Covered: {covered}/{}", rows.len());

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\nWARNINGS");
        let _ = writeln!(out, "{thin}");
        for warning in report.warnings.iter().take(MAX_CONSOLE_WARNINGS) {
            let _ = writeln!(out, "  - {warning}");
        }
        if report.warnings.len() > MAX_CONSOLE_WARNINGS {
            let _ = writeln!(
                out,
                "  ... and {} more warnings",
                report.warnings.len() - MAX_CONSOLE_WARNINGS
            );
        }
    }

    let _ = writeln!(out, "\n{rule}");
    out
}

/// Full report structure as pretty JSON.
pub fn to_json(report: &CoverageReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("serializing coverage report")
}

pub fn export_json(report: &CoverageReport, path: &Path) -> Result<()> {
    let json = to_json(report)?;
    fs::write(path, json).with_context(|| format!("writing JSON report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "JSON report exported");
    Ok(())
}

/// `Protocol,Count,Percentage` plus one row per recognized protocol.
pub fn to_csv(report: &CoverageReport) -> String {
    let mut out = String::from("Protocol,Count,Percentage\n");
    for (kind, stats) in &report.per_protocol {
        let _ = writeln!(
            out,
            "{},{},{:.2}",
            kind.as_str(),
            stats.count,
            stats.percentage
        );
    }
    out
}

pub fn export_csv(report: &CoverageReport, path: &Path) -> Result<()> {
    fs::write(path, to_csv(report))
        .with_context(|| format!("writing CSV report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "CSV report exported");
    Ok(())
}

/// Markdown step summary for the automation collaborator. Deliberately
/// shallow: status, headline numbers, warning count.
pub fn summary_markdown(report: &CoverageReport, status: RunStatus) -> String {
    let icon = if status.is_success() { "✅" } else { "❌" };
    let mut out = String::new();
    let _ = writeln!(out, "## Proxy Coverage Report {icon}");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Status: {}", status.describe());
    let _ = writeln!(out, "- Total configs: {}", report.total_configs);
    let _ = writeln!(
        out,
        "- Valid / invalid: {} / {}",
        report.valid_count, report.invalid_count
    );
    let _ = writeln!(out, "- Warnings: {}", report.warnings.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::aggregate;
    use crate::parse::{parse, RawDescriptor};
    use crate::validate::validate;
    use serde_json::json;

    fn sample_report() -> CoverageReport {
        let outcomes = vec![
            validate(parse(&RawDescriptor::object(
                "t",
                json!({ "Protocol": "vmess", "UUID": "u", "Server": "s", "Port": 1 }),
            ))),
            validate(parse(&RawDescriptor::object(
                "t",
                json!({ "Protocol": "trojan", "Password": "p", "Server": "s", "Port": 2 }),
            ))),
        ];
        aggregate(&outcomes, Vec::new())
    }

    #[test]
    fn csv_has_header_and_all_seven_rows() {
        let csv = to_csv(&sample_report());
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "Protocol,Count,Percentage");
        assert_eq!(lines.len(), 8);
        assert!(lines.contains(&"vmess,1,50.00"));
        // Zero-count rows still carry the same fixed precision.
        assert!(lines.contains(&"ss,0,0.00"));
    }

    #[test]
    fn json_round_trips_headline_numbers() {
        let report = sample_report();
        let json = to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_configs"], 2);
        assert_eq!(value["valid_count"], 2);
        assert_eq!(value["per_protocol"]["vmess"]["count"], 1);
    }

    #[test]
    fn console_report_lists_summary_and_coverage() {
        let text = render_console(&sample_report());
        assert!(text.contains("Total Configurations:      2"));
        assert!(text.contains("VMESS"));
        assert!(text.contains("Protocols Covered: 2/7"));
    }

    #[test]
    fn summary_markdown_reflects_status() {
        let report = sample_report();
        let ok = summary_markdown(&report, RunStatus::Passed);
        assert!(ok.contains("✅"));
        assert!(ok.contains("- Status: passed"));
        let bad = summary_markdown(&report, RunStatus::QualityGateFailed);
        assert!(bad.contains("❌"));
    }
}

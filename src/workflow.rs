// src/workflow.rs
//! GitHub Actions boundary. The automation side only ever sees a success
//! flag and a human-readable summary; nothing here reaches back into the
//! analysis internals.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const ENV_STEP_SUMMARY: &str = "GITHUB_STEP_SUMMARY";
pub const ENV_OUTPUT: &str = "GITHUB_OUTPUT";

fn append_line(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    writeln!(file, "{content}").with_context(|| format!("appending to {}", path.display()))
}

/// Append a markdown block to the workflow step summary, when running under
/// Actions. A no-op otherwise.
pub fn append_step_summary(content: &str) -> Result<()> {
    match std::env::var(ENV_STEP_SUMMARY) {
        Ok(path) => {
            append_line(Path::new(&path), content)?;
            tracing::info!(path, "workflow summary updated");
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

/// Set a `name=value` workflow output, when running under Actions. A no-op
/// otherwise.
pub fn set_output(name: &str, value: &str) -> Result<()> {
    match std::env::var(ENV_OUTPUT) {
        Ok(path) => {
            append_line(Path::new(&path), &format!("{name}={value}"))?;
            tracing::info!(name, value, "workflow output set");
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

/// Publish the run outcome to the automation side: a boolean status output
/// plus the summary block.
pub fn publish(success: bool, summary: &str) -> Result<()> {
    set_output("status", if success { "success" } else { "failed" })?;
    append_step_summary(summary)
}

// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod coverage;
pub mod fetch;
pub mod parse;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod sources;
pub mod validate;
pub mod workflow;

// ---- Re-exports for stable public API ----
pub use crate::coverage::{aggregate, CoverageReport, ProtocolCoverage};
pub use crate::fetch::{Fetch, FetchCoordinator, FetchCycle, FetchError, HttpFetcher};
pub use crate::parse::{parse, ProtocolKind, ProtocolRecord, RawBody, RawDescriptor};
pub use crate::pipeline::{run_cycle, AnalysisRun, RunStatus};
pub use crate::rules::{FilterEngine, Rule, RuleAction, RuleType};
pub use crate::sources::{ConfigError, Source, SourceKind, SourceRegistry, SourceUpdate};
pub use crate::validate::{validate, ValidationOutcome};

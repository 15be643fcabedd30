// src/validate.rs
//! Required-field validation per protocol kind.
//!
//! The schema table is fixed and field names are case-sensitive, as declared
//! by the structured subscription format. Validation is a pure function over
//! one record and is safe to run concurrently across records.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::parse::{ProtocolKind, ProtocolRecord};

static REQUIRED_FIELDS: Lazy<HashMap<ProtocolKind, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<ProtocolKind, &'static [&'static str]> = HashMap::new();
    m.insert(ProtocolKind::Vmess, &["UUID", "Server", "Port"]);
    m.insert(ProtocolKind::Vless, &["UUID", "Server", "Port"]);
    m.insert(ProtocolKind::Trojan, &["Password", "Server", "Port"]);
    m.insert(ProtocolKind::Ss, &["Password", "Cipher", "Server", "Port"]);
    m.insert(ProtocolKind::Ssr, &["Password", "Cipher", "Server", "Port"]);
    m.insert(ProtocolKind::Reality, &["PublicKey", "ShortID", "Server", "Port"]);
    m.insert(ProtocolKind::Xhttp, &["HTTPMethod", "HTTPHost", "Server", "Port"]);
    m
});

/// Required fields for a recognized kind; empty for `Unknown`.
pub fn required_fields(kind: ProtocolKind) -> &'static [&'static str] {
    REQUIRED_FIELDS.get(&kind).copied().unwrap_or(&[])
}

/// Verdict and issue list for one record.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub record: ProtocolRecord,
    pub valid: bool,
    pub issues: Vec<String>,
}

/// A field counts as present only with a non-empty value: null, `""`, `0`,
/// `false` and empty containers all count as missing.
fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Bool(b)) => *b,
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Validate one record against the schema for its declared kind.
pub fn validate(record: ProtocolRecord) -> ValidationOutcome {
    let mut issues = Vec::new();

    match (&record.declared, record.kind) {
        (None, _) => issues.push("Missing protocol field".to_string()),
        (Some(label), ProtocolKind::Unknown) => {
            issues.push(format!("Unsupported protocol: {label}"));
        }
        (Some(_), kind) => {
            for field in required_fields(kind) {
                if !has_value(record.fields.get(*field)) {
                    issues.push(format!("Missing required field: {field}"));
                }
            }
        }
    }

    ValidationOutcome {
        valid: issues.is_empty(),
        issues,
        record,
    }
}

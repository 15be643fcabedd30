// src/parse.rs
//! Descriptor parsing: raw source output → structured `ProtocolRecord`.
//!
//! A raw descriptor is either one trimmed line of a subscription list or one
//! JSON object from a structured source. Parsing only classifies the protocol
//! kind and carries declared fields along; it never fails — anything it cannot
//! recognize ends up as [`ProtocolKind::Unknown`] and is dealt with by the
//! validator.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The proxy protocol family a descriptor declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Vmess,
    Vless,
    Trojan,
    Ss,
    Ssr,
    Reality,
    Xhttp,
    Unknown,
}

impl ProtocolKind {
    /// The seven kinds the coverage table enumerates. `Unknown` is excluded.
    pub const RECOGNIZED: [ProtocolKind; 7] = [
        ProtocolKind::Vmess,
        ProtocolKind::Vless,
        ProtocolKind::Trojan,
        ProtocolKind::Ss,
        ProtocolKind::Ssr,
        ProtocolKind::Reality,
        ProtocolKind::Xhttp,
    ];

    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "vmess" => ProtocolKind::Vmess,
            "vless" => ProtocolKind::Vless,
            "trojan" => ProtocolKind::Trojan,
            "ss" => ProtocolKind::Ss,
            "ssr" => ProtocolKind::Ssr,
            "reality" => ProtocolKind::Reality,
            "xhttp" => ProtocolKind::Xhttp,
            _ => ProtocolKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Vmess => "vmess",
            ProtocolKind::Vless => "vless",
            ProtocolKind::Trojan => "trojan",
            ProtocolKind::Ss => "ss",
            ProtocolKind::Ssr => "ssr",
            ProtocolKind::Reality => "reality",
            ProtocolKind::Xhttp => "xhttp",
            ProtocolKind::Unknown => "unknown",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ProtocolKind::Unknown)
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One descriptor exactly as a source produced it, tagged with the source name.
/// Transient: lives for one fetch cycle only.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDescriptor {
    pub source: String,
    pub body: RawBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    /// One trimmed, non-blank line from a plain or base64 source.
    Line(String),
    /// One JSON value from a structured source.
    Object(Value),
}

impl RawDescriptor {
    pub fn line(source: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            body: RawBody::Line(line.into()),
        }
    }

    pub fn object(source: impl Into<String>, value: Value) -> Self {
        Self {
            source: source.into(),
            body: RawBody::Object(value),
        }
    }
}

/// Structured form of one descriptor. Immutable within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolRecord {
    pub kind: ProtocolKind,
    /// The protocol label exactly as declared by the descriptor, if any.
    /// `None` means no protocol field / no URI scheme was present.
    pub declared: Option<String>,
    pub fields: serde_json::Map<String, Value>,
    pub source: String,
}

/// Convert a raw descriptor into a `ProtocolRecord`. Infallible by contract:
/// unrecognized input classifies as `Unknown` rather than erroring.
pub fn parse(raw: &RawDescriptor) -> ProtocolRecord {
    match &raw.body {
        RawBody::Line(line) => parse_line(&raw.source, line),
        RawBody::Object(value) => parse_object(&raw.source, value),
    }
}

fn scheme_re() -> &'static regex::Regex {
    static RE: OnceCell<regex::Regex> = OnceCell::new();
    RE.get_or_init(|| regex::Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*)://").unwrap())
}

/// Line-anchored scheme extraction. Only a `scheme://` prefix on the trimmed
/// line counts; a scheme string embedded later in the line (say, inside a
/// base64 payload) does not.
fn parse_line(source: &str, line: &str) -> ProtocolRecord {
    let trimmed = line.trim();
    let declared = scheme_re()
        .captures(trimmed)
        .map(|c| c[1].to_ascii_lowercase());
    let kind = declared
        .as_deref()
        .map(ProtocolKind::from_label)
        .unwrap_or(ProtocolKind::Unknown);

    ProtocolRecord {
        kind,
        declared,
        fields: serde_json::Map::new(),
        source: source.to_string(),
    }
}

fn parse_object(source: &str, value: &Value) -> ProtocolRecord {
    let fields = match value.as_object() {
        Some(map) => map.clone(),
        None => serde_json::Map::new(),
    };

    // `Protocol` / `protocol` (any casing of the key) carries the kind.
    // Non-string scalars are stringified so a declared-but-bogus value
    // classifies as unsupported rather than absent; empty/zero/false still
    // count as no declaration.
    let declared = fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("protocol"))
        .and_then(|(_, v)| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
            Value::Bool(true) => Some("true".to_string()),
            _ => None,
        });
    let kind = declared
        .as_deref()
        .map(ProtocolKind::from_label)
        .unwrap_or(ProtocolKind::Unknown);

    ProtocolRecord {
        kind,
        declared,
        fields,
        source: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn line_scheme_is_extracted_and_lowercased() {
        let rec = parse(&RawDescriptor::line("src-a", "  VMess://abcdef  "));
        assert_eq!(rec.kind, ProtocolKind::Vmess);
        assert_eq!(rec.declared.as_deref(), Some("vmess"));
        assert!(rec.fields.is_empty());
        assert_eq!(rec.source, "src-a");
    }

    #[test]
    fn embedded_scheme_does_not_count() {
        // Scheme strings inside a payload must not classify the line.
        let rec = parse(&RawDescriptor::line("s", "ZHVtbXk=vmess://inside"));
        assert_eq!(rec.kind, ProtocolKind::Unknown);
        assert_eq!(rec.declared, None);
    }

    #[test]
    fn unrecognized_scheme_is_unknown_but_declared() {
        let rec = parse(&RawDescriptor::line("s", "wireguard://peer"));
        assert_eq!(rec.kind, ProtocolKind::Unknown);
        assert_eq!(rec.declared.as_deref(), Some("wireguard"));
    }

    #[test]
    fn object_protocol_key_is_case_insensitive() {
        for key in ["Protocol", "protocol", "PROTOCOL"] {
            let rec = parse(&RawDescriptor::object(
                "s",
                json!({ key: "Trojan", "Server": "h", "Port": 443 }),
            ));
            assert_eq!(rec.kind, ProtocolKind::Trojan, "key {key}");
            assert_eq!(rec.declared.as_deref(), Some("Trojan"));
            assert_eq!(rec.fields.len(), 3);
        }
    }

    #[test]
    fn numeric_protocol_value_is_declared_not_absent() {
        let rec = parse(&RawDescriptor::object("s", json!({ "Protocol": 123 })));
        assert_eq!(rec.kind, ProtocolKind::Unknown);
        assert_eq!(rec.declared.as_deref(), Some("123"));
    }

    #[test]
    fn falsy_protocol_values_count_as_no_declaration() {
        for value in [json!(0), json!(false), json!(""), json!(null)] {
            let rec = parse(&RawDescriptor::object("s", json!({ "Protocol": value })));
            assert_eq!(rec.declared, None, "value should not declare a protocol");
        }
    }

    #[test]
    fn object_without_protocol_field_is_unknown() {
        let rec = parse(&RawDescriptor::object("s", json!({ "Server": "h" })));
        assert_eq!(rec.kind, ProtocolKind::Unknown);
        assert_eq!(rec.declared, None);
        assert_eq!(rec.fields.len(), 1);
    }
}

// src/rules.rs
//! Filtering rule definitions and the engine built from them.
//!
//! Rules arrive as a JSON list; each entry names a pattern, a rule type
//! (protocol | country | domain) and an action (include | exclude). A
//! malformed entry is fatal to that entry only: the loader collects its
//! error and keeps going.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::parse::ProtocolRecord;
use crate::sources::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Protocol,
    Country,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RuleType,
    pub pattern: String,
    pub action: RuleAction,
    pub enabled: bool,
}

const REQUIRED_RULE_FIELDS: [&str; 5] = ["name", "type", "pattern", "action", "enabled"];

/// Parse a rules document. Entry-level problems land in the error list;
/// only an unreadable or non-list document fails outright.
pub fn parse_rules(content: &str) -> Result<(Vec<Rule>, Vec<ConfigError>), ConfigError> {
    let doc: Value =
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let entries = doc.as_array().ok_or(ConfigError::RulesNotAList)?;

    let mut rules = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    'entries: for (index, entry) in entries.iter().enumerate() {
        for field in REQUIRED_RULE_FIELDS {
            if entry.get(field).is_none() {
                errors.push(ConfigError::MissingRuleField { index, field });
                continue 'entries;
            }
        }
        match serde_json::from_value::<Rule>(entry.clone()) {
            Ok(rule) => rules.push(rule),
            Err(e) => errors.push(ConfigError::MalformedRule {
                index,
                reason: e.to_string(),
            }),
        }
    }

    Ok((rules, errors))
}

pub fn load_rules(path: &Path) -> Result<(Vec<Rule>, Vec<ConfigError>), ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_rules(&content)
}

/// Include/exclude decision over validated records, compiled once from the
/// enabled rules. Only the combinations the rule schema gives meaning to are
/// compiled: country include (whitelist), protocol include, domain exclude
/// (blacklist, substring match).
#[derive(Debug, Default)]
pub struct FilterEngine {
    country_whitelist: HashSet<String>,
    protocol_include: HashSet<String>,
    domain_blacklist: Vec<String>,
}

impl FilterEngine {
    pub fn new(rules: &[Rule]) -> Self {
        let mut engine = Self::default();
        for rule in rules.iter().filter(|r| r.enabled) {
            match (rule.kind, rule.action) {
                (RuleType::Country, RuleAction::Include) => {
                    engine.country_whitelist.insert(rule.pattern.clone());
                }
                (RuleType::Protocol, RuleAction::Include) => {
                    engine.protocol_include.insert(rule.pattern.to_ascii_lowercase());
                }
                (RuleType::Domain, RuleAction::Exclude) => {
                    engine.domain_blacklist.push(rule.pattern.clone());
                }
                _ => {}
            }
        }
        engine
    }

    /// Whether a record passes every active rule set. Empty sets do not
    /// constrain.
    pub fn allows(&self, record: &ProtocolRecord) -> bool {
        if !self.country_whitelist.is_empty() {
            let country = field_str(record, "Country");
            if !country.is_some_and(|c| self.country_whitelist.contains(c)) {
                return false;
            }
        }

        if !self.protocol_include.is_empty()
            && !self.protocol_include.contains(record.kind.as_str())
        {
            return false;
        }

        if let Some(server) = field_str(record, "Server") {
            if self
                .domain_blacklist
                .iter()
                .any(|blocked| server.contains(blocked.as_str()))
            {
                return false;
            }
        }

        true
    }

    /// Retain only the records every rule allows.
    pub fn filter_records(&self, records: Vec<ProtocolRecord>) -> Vec<ProtocolRecord> {
        let before = records.len();
        let kept: Vec<_> = records.into_iter().filter(|r| self.allows(r)).collect();
        tracing::info!(before, after = kept.len(), "applied filter rules");
        kept
    }
}

fn field_str<'a>(record: &'a ProtocolRecord, key: &str) -> Option<&'a str> {
    record.fields.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, RawDescriptor};
    use serde_json::json;

    fn record(value: serde_json::Value) -> ProtocolRecord {
        parse(&RawDescriptor::object("t", value))
    }

    fn rule(kind: RuleType, pattern: &str, action: RuleAction, enabled: bool) -> Rule {
        Rule {
            name: format!("{pattern}-rule"),
            kind,
            pattern: pattern.to_string(),
            action,
            enabled,
        }
    }

    #[test]
    fn valid_rules_document_parses_cleanly() {
        let doc = r#"[
            { "name": "only-vmess", "type": "protocol", "pattern": "vmess",
              "action": "include", "enabled": true },
            { "name": "no-cdn", "type": "domain", "pattern": "cdn.bad.example",
              "action": "exclude", "enabled": true }
        ]"#;
        let (rules, errors) = parse_rules(doc).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(errors.is_empty());
        assert_eq!(rules[0].kind, RuleType::Protocol);
        assert_eq!(rules[1].action, RuleAction::Exclude);
    }

    #[test]
    fn bad_entries_are_collected_not_fatal() {
        let doc = r#"[
            { "name": "ok", "type": "protocol", "pattern": "ss",
              "action": "include", "enabled": true },
            { "name": "no-pattern", "type": "protocol",
              "action": "include", "enabled": true },
            { "name": "bad-type", "type": "firewall", "pattern": "x",
              "action": "include", "enabled": true }
        ]"#;
        let (rules, errors) = parse_rules(doc).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            ConfigError::MissingRuleField { index: 1, field: "pattern" }
        ));
        assert!(matches!(errors[1], ConfigError::MalformedRule { index: 2, .. }));
    }

    #[test]
    fn non_list_document_is_fatal() {
        let err = parse_rules(r#"{ "rules": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::RulesNotAList));
    }

    #[test]
    fn protocol_include_set_constrains() {
        let engine = FilterEngine::new(&[rule(
            RuleType::Protocol,
            "vmess",
            RuleAction::Include,
            true,
        )]);
        let vmess = record(json!({ "Protocol": "vmess", "Server": "a" }));
        let trojan = record(json!({ "Protocol": "trojan", "Server": "a" }));
        assert!(engine.allows(&vmess));
        assert!(!engine.allows(&trojan));
    }

    #[test]
    fn domain_blacklist_matches_substrings() {
        let engine = FilterEngine::new(&[rule(
            RuleType::Domain,
            "bad.example",
            RuleAction::Exclude,
            true,
        )]);
        let blocked = record(json!({ "Protocol": "ss", "Server": "eu.bad.example" }));
        let fine = record(json!({ "Protocol": "ss", "Server": "good.example" }));
        assert!(!engine.allows(&blocked));
        assert!(engine.allows(&fine));
    }

    #[test]
    fn country_whitelist_requires_a_match() {
        let engine = FilterEngine::new(&[rule(
            RuleType::Country,
            "DE",
            RuleAction::Include,
            true,
        )]);
        let de = record(json!({ "Protocol": "ss", "Country": "DE" }));
        let fr = record(json!({ "Protocol": "ss", "Country": "FR" }));
        let none = record(json!({ "Protocol": "ss" }));
        assert!(engine.allows(&de));
        assert!(!engine.allows(&fr));
        assert!(!engine.allows(&none));
    }

    #[test]
    fn disabled_rules_do_not_constrain() {
        let engine = FilterEngine::new(&[rule(
            RuleType::Protocol,
            "vmess",
            RuleAction::Include,
            false,
        )]);
        let trojan = record(json!({ "Protocol": "trojan" }));
        assert!(engine.allows(&trojan));
    }
}

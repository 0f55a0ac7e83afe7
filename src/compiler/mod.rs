//! Fingerprinting rule compiler.
//!
//! This module turns rule documents into validated, immutable
//! [`FingerprintingRules`]. Every matcher key is resolved, every glob is
//! prepared and every fingerprint placeholder is checked at load time, so
//! evaluation never has to deal with a malformed rule.
//!
//! The compiler is organized into two sub-modules:
//! - [`key_mapping`] - Matcher key aliases (`error.type` -> `type`)
//! - [`parser`] - Tokenization and parsing of the text rule syntax
//!
//! # Examples
//!
//! From the configuration structure:
//! ```rust
//! use fingerprint_engine::RuleCompiler;
//!
//! let compiler = RuleCompiler::new();
//! let rules = compiler.compile_yaml(r#"
//! version: 1
//! rules:
//!   - matchers: [["type", "DatabaseUnavailable"], ["!app", "no"]]
//!     fingerprint: ["database-unavailable"]
//! "#)?;
//! assert_eq!(rules.len(), 1);
//! # Ok::<(), fingerprint_engine::FingerprintError>(())
//! ```
//!
//! From the text rule syntax:
//! ```rust
//! use fingerprint_engine::RuleCompiler;
//!
//! let rules = RuleCompiler::new().compile_text(
//!     r#"value:"*went wrong*" -> something-went-wrong "{{ error.value }}""#,
//! )?;
//! assert_eq!(rules.rules()[0].fingerprint.len(), 2);
//! # Ok::<(), fingerprint_engine::FingerprintError>(())
//! ```

pub mod key_mapping;
pub(crate) mod parser;

pub use key_mapping::KeyMapping;

use crate::error::{FingerprintError, Result};
use crate::ir::{FingerprintingRules, Rule, RuleConfig, RulesConfig, CONFIG_VERSION};
use crate::matcher::CompiledMatcher;
use crate::template::parse_token;
use serde::Deserialize;
use std::path::Path;

/// Top-level document shape before the version is checked.
#[derive(Debug, Deserialize)]
struct RawRulesDocument {
    version: Option<u32>,
    rules: Option<Vec<RuleConfig>>,
}

/// The fingerprinting rule compiler.
///
/// Loading is all-or-nothing: the first invalid rule fails the whole
/// document and nothing is returned.
#[derive(Debug, Clone, Default)]
pub struct RuleCompiler {
    key_mapping: KeyMapping,
}

impl RuleCompiler {
    /// Create a compiler with the built-in key aliases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler with a custom key mapping.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fingerprint_engine::{KeyMapping, RuleCompiler};
    ///
    /// let mut mapping = KeyMapping::new();
    /// mapping.add_alias("culprit".to_string(), "transaction".to_string());
    ///
    /// let compiler = RuleCompiler::with_key_mapping(mapping);
    /// assert!(compiler.compile_text("culprit:/checkout -> checkout").is_ok());
    /// ```
    pub fn with_key_mapping(key_mapping: KeyMapping) -> Self {
        Self { key_mapping }
    }

    /// Get a mutable reference to the key mapping for configuration.
    pub fn key_mapping_mut(&mut self) -> &mut KeyMapping {
        &mut self.key_mapping
    }

    pub fn key_mapping(&self) -> &KeyMapping {
        &self.key_mapping
    }

    /// Compile a versioned YAML rules document.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML is malformed
    /// - `version` or `rules` is missing
    /// - The version is not supported
    /// - Any rule fails validation
    pub fn compile_yaml(&self, yaml: &str) -> Result<FingerprintingRules> {
        let document: RawRulesDocument = serde_yaml::from_str(yaml)
            .map_err(|e| FingerprintError::ConfigError(format!("invalid YAML: {e}")))?;
        self.compile_document(document)
    }

    /// Compile a versioned JSON rules document.
    pub fn compile_json(&self, json: &str) -> Result<FingerprintingRules> {
        let document: RawRulesDocument = serde_json::from_str(json)
            .map_err(|e| FingerprintError::ConfigError(format!("invalid JSON: {e}")))?;
        self.compile_document(document)
    }

    /// Compile rules written in the text rule syntax.
    pub fn compile_text(&self, text: &str) -> Result<FingerprintingRules> {
        let rules = parser::parse_rules(text)?;
        self.compile_config(RulesConfig {
            version: CONFIG_VERSION,
            rules,
        })
    }

    /// Load a rules file, choosing the format by extension: `.yaml`/`.yml`,
    /// `.json`, anything else as the text rule syntax.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<FingerprintingRules> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        log::debug!("loading fingerprinting rules from {}", path.display());

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => self.compile_yaml(&content),
            Some("json") => self.compile_json(&content),
            _ => self.compile_text(&content),
        }
    }

    /// Compile an already deserialized configuration structure.
    pub fn compile_config(&self, config: RulesConfig) -> Result<FingerprintingRules> {
        if config.version != CONFIG_VERSION {
            return Err(FingerprintError::UnsupportedVersion(config.version));
        }

        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                self.compile_rule(rule).map_err(|e| {
                    log::debug!("rule {index} rejected: {e}");
                    e
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("compiled {} fingerprinting rules", rules.len());
        Ok(FingerprintingRules::new(rules))
    }

    /// Compile and validate a single rule.
    pub fn compile_rule(&self, config: &RuleConfig) -> Result<Rule> {
        if config.matchers.is_empty() {
            return Err(FingerprintError::ConfigError(
                "rule has no matchers".to_string(),
            ));
        }
        if config.fingerprint.is_empty() {
            return Err(FingerprintError::ConfigError(
                "rule has an empty fingerprint".to_string(),
            ));
        }

        let matchers = config
            .matchers
            .iter()
            .map(|(raw_key, pattern)| {
                let (negated, key) = self.key_mapping.resolve(raw_key)?;
                CompiledMatcher::compile(key, pattern, negated)
            })
            .collect::<Result<Vec<_>>>()?;

        let fingerprint = config
            .fingerprint
            .iter()
            .map(|raw| parse_token(raw, &self.key_mapping))
            .collect::<Result<Vec<_>>>()?;

        Ok(Rule {
            matchers,
            fingerprint,
            attributes: config.attributes.clone(),
        })
    }

    fn compile_document(&self, document: RawRulesDocument) -> Result<FingerprintingRules> {
        let version = document
            .version
            .ok_or_else(|| FingerprintError::ConfigError("missing version".to_string()))?;
        let rules = document
            .rules
            .ok_or_else(|| FingerprintError::ConfigError("missing rules".to_string()))?;
        self.compile_config(RulesConfig { version, rules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MatcherKey;

    #[test]
    fn test_compile_yaml() {
        let rules = RuleCompiler::new()
            .compile_yaml(
                r#"
version: 1
rules:
  - matchers: [["error.type", "DatabaseUnavailable"]]
    fingerprint: ["database-unavailable", "{{ error.value }}"]
    attributes:
      title: Database down
"#,
            )
            .unwrap();

        let rule = &rules.rules()[0];
        assert_eq!(rule.matchers[0].key(), &MatcherKey::Type);
        assert_eq!(rule.fingerprint[1].raw, "{{ error.value }}");
        assert_eq!(rule.attributes["title"], "Database down");
    }

    #[test]
    fn test_compile_json() {
        let rules = RuleCompiler::new()
            .compile_json(
                r#"{"version": 1, "rules": [
                    {"matchers": [["logger", "sql.*"]], "fingerprint": ["sql"]}
                ]}"#,
            )
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules.rules()[0].attributes.is_empty());
    }

    #[test]
    fn test_missing_version() {
        let err = RuleCompiler::new().compile_yaml("rules: []").unwrap_err();
        assert_eq!(err, FingerprintError::ConfigError("missing version".to_string()));
    }

    #[test]
    fn test_missing_rules() {
        let err = RuleCompiler::new().compile_json(r#"{"version": 1}"#).unwrap_err();
        assert_eq!(err, FingerprintError::ConfigError("missing rules".to_string()));
    }

    #[test]
    fn test_unsupported_version() {
        let err = RuleCompiler::new()
            .compile_yaml("version: 2\nrules: []")
            .unwrap_err();
        assert_eq!(err, FingerprintError::UnsupportedVersion(2));
    }

    #[test]
    fn test_malformed_documents() {
        let compiler = RuleCompiler::new();
        assert!(matches!(
            compiler.compile_yaml("version: [1"),
            Err(FingerprintError::ConfigError(_))
        ));
        assert!(matches!(
            compiler.compile_json("{"),
            Err(FingerprintError::ConfigError(_))
        ));
    }

    #[test]
    fn test_empty_rule_list() {
        let rules = RuleCompiler::new().compile_yaml("version: 1\nrules: []").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_rejects_empty_fingerprint() {
        let config = RuleConfig {
            matchers: vec![("type".to_string(), "A".to_string())],
            fingerprint: vec![],
            attributes: Default::default(),
        };
        assert!(matches!(
            RuleCompiler::new().compile_rule(&config),
            Err(FingerprintError::ConfigError(_))
        ));
    }

    #[test]
    fn test_unknown_key_fails_whole_document() {
        let err = RuleCompiler::new()
            .compile_text("type:A -> a\ncolour:red -> b")
            .unwrap_err();
        assert_eq!(err, FingerprintError::UnknownMatcherKey("colour".to_string()));
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        assert!(matches!(
            RuleCompiler::new().compile_text(r#"type:A -> "{{ colour }}""#),
            Err(FingerprintError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_app_pattern() {
        assert!(matches!(
            RuleCompiler::new().compile_text("app:maybe -> a"),
            Err(FingerprintError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_custom_alias() {
        let mut compiler = RuleCompiler::new();
        compiler
            .key_mapping_mut()
            .add_alias("exception.class".to_string(), "type".to_string());

        let rules = compiler.compile_text("exception.class:Boom -> boom").unwrap();
        assert_eq!(rules.rules()[0].matchers[0].key(), &MatcherKey::Type);
    }

    #[test]
    fn test_text_and_structure_agree() {
        let compiler = RuleCompiler::new();
        let from_text = compiler
            .compile_text(r#"!type:A path:"**/db/*.py" -> "db", "{{ default }}" title="DB""#)
            .unwrap();
        let from_yaml = compiler
            .compile_yaml(
                r#"
version: 1
rules:
  - matchers: [["!type", "A"], ["path", "**/db/*.py"]]
    fingerprint: ["db", "{{ default }}"]
    attributes: {title: DB}
"#,
            )
            .unwrap();

        assert_eq!(from_text.to_config(), from_yaml.to_config());
        assert!(from_text.rules()[0].is_salted());
    }

    #[test]
    fn test_non_ascii_whitespace_between_tokens() {
        let rules = RuleCompiler::new().compile_text("type:A\u{a0}-> b").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].fingerprint[0].raw, "b");
    }

    #[test]
    fn test_bare_default_placeholder_salts_rule() {
        let rules = RuleCompiler::new()
            .compile_text("type:A -> my-route, {{ default }}")
            .unwrap();
        let rule = &rules.rules()[0];

        assert_eq!(rule.fingerprint.len(), 2);
        assert_eq!(rule.fingerprint[1].raw, "{{ default }}");
        assert!(rule.is_salted());
    }

    #[test]
    fn test_bare_unknown_placeholder_rejected() {
        assert!(matches!(
            RuleCompiler::new().compile_text("type:A -> {{ colour }}"),
            Err(FingerprintError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rule_lines_load_back() {
        let compiler = RuleCompiler::new();
        let rules = compiler
            .compile_text(r#"message:"say \"hi\"" app:yes -> hello "{{ message }}" note=x"#)
            .unwrap();
        let reloaded = compiler.compile_text(&rules.to_config_string()).unwrap();
        assert_eq!(rules.to_config(), reloaded.to_config());
    }
}

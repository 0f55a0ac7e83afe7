//! Intermediate Representation (IR) for fingerprinting rules.
//!
//! This module defines the loaded, validated form of a rule set together
//! with the serde shape of the versioned configuration document it comes
//! from. Everything here is immutable once the compiler hands it out.

use crate::matcher::CompiledMatcher;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Only configuration version understood by this crate.
pub const CONFIG_VERSION: u32 = 1;

/// Literal form of the default-grouping marker inside a fingerprint.
pub const DEFAULT_MARKER: &str = "{{ default }}";

pub type RuleIndex = usize;

/// Which part of the event a matcher key inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchLevel {
    /// Any single exception of the chain.
    Exception,
    /// Any single stack frame.
    Frame,
    /// The event as a whole.
    Event,
}

/// Canonical matcher key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatcherKey {
    Type,
    Value,
    Module,
    Function,
    Path,
    Package,
    App,
    Family,
    Message,
    Logger,
    Level,
    Transaction,
    Release,
    Sdk,
    Tag(String),
}

impl MatcherKey {
    /// Resolve a canonical key name. Aliases are handled by
    /// [`KeyMapping`](crate::compiler::KeyMapping) before this is called.
    pub fn from_canonical(name: &str) -> Option<Self> {
        let key = match name {
            "type" => MatcherKey::Type,
            "value" => MatcherKey::Value,
            "module" => MatcherKey::Module,
            "function" => MatcherKey::Function,
            "path" => MatcherKey::Path,
            "package" => MatcherKey::Package,
            "app" => MatcherKey::App,
            "family" => MatcherKey::Family,
            "message" => MatcherKey::Message,
            "logger" => MatcherKey::Logger,
            "level" => MatcherKey::Level,
            "transaction" => MatcherKey::Transaction,
            "release" => MatcherKey::Release,
            "sdk" => MatcherKey::Sdk,
            _ => {
                let tag = name.strip_prefix("tags.")?;
                if tag.is_empty() {
                    return None;
                }
                MatcherKey::Tag(tag.to_string())
            }
        };
        Some(key)
    }

    pub fn name(&self) -> Cow<'static, str> {
        let name = match self {
            MatcherKey::Type => "type",
            MatcherKey::Value => "value",
            MatcherKey::Module => "module",
            MatcherKey::Function => "function",
            MatcherKey::Path => "path",
            MatcherKey::Package => "package",
            MatcherKey::App => "app",
            MatcherKey::Family => "family",
            MatcherKey::Message => "message",
            MatcherKey::Logger => "logger",
            MatcherKey::Level => "level",
            MatcherKey::Transaction => "transaction",
            MatcherKey::Release => "release",
            MatcherKey::Sdk => "sdk",
            MatcherKey::Tag(tag) => return Cow::Owned(format!("tags.{tag}")),
        };
        Cow::Borrowed(name)
    }

    pub fn level(&self) -> MatchLevel {
        match self {
            MatcherKey::Type | MatcherKey::Value => MatchLevel::Exception,
            MatcherKey::Module
            | MatcherKey::Function
            | MatcherKey::Path
            | MatcherKey::Package
            | MatcherKey::App
            | MatcherKey::Family => MatchLevel::Frame,
            MatcherKey::Message
            | MatcherKey::Logger
            | MatcherKey::Level
            | MatcherKey::Transaction
            | MatcherKey::Release
            | MatcherKey::Sdk
            | MatcherKey::Tag(_) => MatchLevel::Event,
        }
    }

    /// Keys whose glob comparison ignores case.
    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            MatcherKey::Value
                | MatcherKey::Message
                | MatcherKey::Level
                | MatcherKey::Logger
                | MatcherKey::Path
                | MatcherKey::Package
                | MatcherKey::Family
        )
    }

    /// Keys matched with path semantics (`/` separated, `**` crosses it).
    pub fn is_path_like(&self) -> bool {
        matches!(self, MatcherKey::Path | MatcherKey::Package)
    }

    /// Keys that can be referenced from a fingerprint template.
    pub fn is_renderable(&self) -> bool {
        !matches!(self, MatcherKey::App | MatcherKey::Family)
    }
}

impl fmt::Display for MatcherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// One piece of a fingerprint token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    /// `{{ error.value }}`-style field reference.
    Field(MatcherKey),
    /// `{{ default }}`.
    Default,
}

/// A single fingerprint template entry as authored, with its parsed segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintToken {
    pub raw: String,
    pub segments: Vec<TemplateSegment>,
}

impl FingerprintToken {
    pub fn literal(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            segments: vec![TemplateSegment::Literal(raw.clone())],
            raw,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, TemplateSegment::Literal(_)))
    }

    pub fn has_default(&self) -> bool {
        self.segments.contains(&TemplateSegment::Default)
    }
}

/// A loaded fingerprinting rule: matchers, attributes and template.
#[derive(Debug, Clone)]
pub struct Rule {
    pub matchers: Vec<CompiledMatcher>,
    pub fingerprint: Vec<FingerprintToken>,
    pub attributes: BTreeMap<String, String>,
}

impl Rule {
    /// Whether the template salts the default grouping.
    pub fn is_salted(&self) -> bool {
        self.fingerprint.iter().any(FingerprintToken::has_default)
    }

    /// Human-readable form, e.g.
    /// `value:"*went wrong*" -> "something-went-wrong{{ error.value }}"`.
    pub fn text(&self) -> String {
        let matchers: Vec<String> = self.matchers.iter().map(CompiledMatcher::text).collect();
        let fingerprint: String = self.fingerprint.iter().map(|t| t.raw.as_str()).collect();
        let mut text = format!("{} -> \"{}\"", matchers.join(" "), escape_quoted(&fingerprint));
        for (key, value) in &self.attributes {
            text.push_str(&format!(" {key}=\"{}\"", escape_quoted(value)));
        }
        text
    }

    /// Line in the text rule syntax that loads back into this rule.
    pub fn to_rule_line(&self) -> String {
        let matchers: Vec<String> = self.matchers.iter().map(CompiledMatcher::text).collect();
        let fingerprint: Vec<String> = self
            .fingerprint
            .iter()
            .map(|t| format!("\"{}\"", escape_quoted(&t.raw)))
            .collect();
        let mut line = format!("{} -> {}", matchers.join(" "), fingerprint.join(" "));
        for (key, value) in &self.attributes {
            line.push_str(&format!(" {key}=\"{}\"", escape_quoted(value)));
        }
        line
    }

    /// Configuration-structure form of this rule.
    pub fn to_config(&self) -> RuleConfig {
        RuleConfig {
            matchers: self
                .matchers
                .iter()
                .map(|m| (m.config_key(), m.pattern().to_string()))
                .collect(),
            fingerprint: self.fingerprint.iter().map(|t| t.raw.clone()).collect(),
            attributes: self.attributes.clone(),
        }
    }
}

pub(crate) fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// An immutable, versioned, ordered rule set.
#[derive(Debug, Clone)]
pub struct FingerprintingRules {
    version: u32,
    rules: Vec<Arc<Rule>>,
}

impl FingerprintingRules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            version: CONFIG_VERSION,
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn to_config(&self) -> RulesConfig {
        RulesConfig {
            version: self.version,
            rules: self.rules.iter().map(|rule| rule.to_config()).collect(),
        }
    }

    /// Render the rule set in the text rule syntax, one rule per line.
    pub fn to_config_string(&self) -> String {
        self.rules
            .iter()
            .map(|rule| format!("{}\n", rule.to_rule_line()))
            .collect()
    }
}

/// Serialized form of a rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    pub version: u32,
    pub rules: Vec<RuleConfig>,
}

/// Serialized form of one rule. Negated matchers carry a `!` key prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub matchers: Vec<(String, String)>,
    pub fingerprint: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

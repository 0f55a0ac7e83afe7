//! Matcher key aliases.
//!
//! This module provides the [`KeyMapping`] struct which normalizes the key
//! names accepted in rules and fingerprint placeholders to their canonical
//! form. Discover-style names (`error.type`, `stack.module`, ...) are
//! registered by default; deployments can add their own.

use crate::error::{FingerprintError, Result};
use crate::ir::MatcherKey;
use std::collections::HashMap;

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("error.type", "type"),
    ("error.value", "value"),
    ("stack.module", "module"),
    ("stack.function", "function"),
    ("stack.abs_path", "path"),
    ("stack.package", "package"),
];

/// Alias table for matcher keys.
///
/// # Examples
///
/// ```rust
/// use fingerprint_engine::compiler::KeyMapping;
///
/// let mut mapping = KeyMapping::new();
/// assert_eq!(mapping.normalize_key("error.type"), "type");
///
/// mapping.add_alias("exception.class".to_string(), "type".to_string());
/// assert_eq!(mapping.normalize_key("exception.class"), "type");
/// assert_eq!(mapping.normalize_key("module"), "module");
/// ```
#[derive(Debug, Clone)]
pub struct KeyMapping {
    aliases: HashMap<String, String>,
}

impl KeyMapping {
    /// Create a mapping with the built-in aliases registered.
    pub fn new() -> Self {
        let mut mapping = Self::empty();
        for (alias, canonical) in BUILTIN_ALIASES {
            mapping.add_alias(alias.to_string(), canonical.to_string());
        }
        mapping
    }

    /// Create a mapping with no aliases at all.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Register an alias. The target must be a canonical key name.
    pub fn add_alias(&mut self, alias: String, canonical: String) {
        self.aliases.insert(alias, canonical);
    }

    /// Normalize a key name, returning it unchanged when no alias exists.
    pub fn normalize_key(&self, key: &str) -> String {
        self.aliases
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    pub fn has_alias(&self, key: &str) -> bool {
        self.aliases.contains_key(key)
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    /// Resolve a key as written in a rule into its canonical [`MatcherKey`].
    ///
    /// Returns whether the key was negated with a leading `!`.
    pub fn resolve(&self, raw: &str) -> Result<(bool, MatcherKey)> {
        let (negated, name) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let key = self.lookup(name)?;
        Ok((negated, key))
    }

    /// Resolve a key name that cannot be negated.
    pub fn lookup(&self, name: &str) -> Result<MatcherKey> {
        let canonical = self.normalize_key(name.trim());
        MatcherKey::from_canonical(&canonical)
            .ok_or_else(|| FingerprintError::UnknownMatcherKey(name.to_string()))
    }
}

impl Default for KeyMapping {
    fn default() -> Self {
        Self::new()
    }
}

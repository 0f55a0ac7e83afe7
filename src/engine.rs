//! Primary fingerprint engine interface.
//!
//! This module provides [`FingerprintEngine`], which ties rule selection,
//! template rendering and variant classification together, and
//! [`RuleStore`], the hot-swappable holder of the active rule set.

use crate::compiler::RuleCompiler;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::event::Event;
use crate::ir::{FingerprintToken, FingerprintingRules, Rule, RuleIndex};
use crate::matcher::matches_all;
use crate::template::{parse_token, DefaultComponentFn, TemplateRenderer};
use crate::variant::{VariantClassifier, Variants};
use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// The first rule, in declaration order, whose matchers all hold.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub rule_index: RuleIndex,
    pub rule: Arc<Rule>,
    /// [`Rule::text`] of the matched rule.
    pub text: String,
}

impl PartialEq for MatchResult {
    fn eq(&self, other: &Self) -> bool {
        self.rule_index == other.rule_index && self.text == other.text
    }
}

impl Serialize for MatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MatchResult", 2)?;
        state.serialize_field("rule_index", &self.rule_index)?;
        state.serialize_field("text", &self.text)?;
        state.end()
    }
}

/// Select the first matching rule. Later rules are never consulted once one
/// matches.
pub fn select_rule(event: &Event, rules: &FingerprintingRules) -> Option<MatchResult> {
    rules
        .rules()
        .iter()
        .enumerate()
        .find(|(_, rule)| matches_all(&rule.matchers, event))
        .map(|(rule_index, rule)| MatchResult {
            rule_index,
            rule: Arc::clone(rule),
            text: rule.text(),
        })
}

/// Result of evaluating one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupingOutcome {
    /// Effective fingerprint with `{{ default }}` expanded.
    pub fingerprint: Vec<String>,
    pub matched_rule: Option<MatchResult>,
    pub variants: Variants,
}

impl GroupingOutcome {
    /// Name of the contributing variant.
    pub fn contributing_variant(&self) -> Option<&str> {
        crate::variant::contributing_variant(&self.variants).map(|(name, _)| name)
    }
}

/// Holder of the active rule set.
///
/// Readers get an `Arc` snapshot; [`RuleStore::swap`] replaces the set
/// atomically, so every evaluation sees either the old or the new rules in
/// full.
#[derive(Debug)]
pub struct RuleStore {
    current: RwLock<Arc<FingerprintingRules>>,
}

impl RuleStore {
    pub fn new(rules: FingerprintingRules) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    /// Snapshot of the active rules.
    pub fn load(&self) -> Arc<FingerprintingRules> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install `rules`, returning the previous set.
    pub fn swap(&self, rules: FingerprintingRules) -> Arc<FingerprintingRules> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(rules))
    }
}

/// Fingerprint engine for grouping events.
///
/// # Examples
///
/// ```rust
/// use fingerprint_engine::{Event, FingerprintEngine, RuleCompiler};
///
/// let rules = RuleCompiler::new()
///     .compile_text(r#"value:"*went wrong*" -> "something-went-wrong" "{{ error.value }}""#)?;
/// let engine = FingerprintEngine::new(rules);
///
/// let event = Event::builder().value("something went WRONG").build();
/// let outcome = engine.evaluate(&event)?;
///
/// assert_eq!(outcome.fingerprint, vec!["something-went-wrong", "something went WRONG"]);
/// assert_eq!(outcome.contributing_variant(), Some("custom-fingerprint"));
/// # Ok::<(), fingerprint_engine::FingerprintError>(())
/// ```
#[derive(Debug)]
pub struct FingerprintEngine {
    store: RuleStore,
    compiler: RuleCompiler,
    renderer: TemplateRenderer,
    classifier: VariantClassifier,
    config: EngineConfig,
}

impl FingerprintEngine {
    /// Create an engine with the default configuration.
    pub fn new(rules: FingerprintingRules) -> Self {
        Self::with_config(rules, EngineConfig::default())
    }

    pub fn with_config(rules: FingerprintingRules, config: EngineConfig) -> Self {
        Self {
            store: RuleStore::new(rules),
            compiler: RuleCompiler::new(),
            renderer: TemplateRenderer::new(),
            classifier: VariantClassifier::new(config.variants.clone()),
            config,
        }
    }

    /// Plug in the system default grouping component used to expand
    /// `{{ default }}`.
    pub fn with_default_component(mut self, default_component: DefaultComponentFn) -> Self {
        self.renderer = TemplateRenderer::with_default_component(default_component);
        self
    }

    /// Use `compiler` for reloads and client fingerprint placeholders.
    pub fn with_compiler(mut self, compiler: RuleCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the active rules.
    pub fn rules(&self) -> Arc<FingerprintingRules> {
        self.store.load()
    }

    pub fn rule_count(&self) -> usize {
        self.store.load().len()
    }

    /// Replace the active rule set. Evaluations already running keep the
    /// snapshot they started with.
    pub fn reload(&self, rules: FingerprintingRules) {
        let count = rules.len();
        let previous = self.store.swap(rules);
        log::info!(
            "fingerprinting rules reloaded: {} -> {} rules",
            previous.len(),
            count
        );
    }

    /// Load a rules file and install it. On error the active rules stay in
    /// place.
    pub fn reload_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let rules = self.compiler.load_file(path)?;
        let count = rules.len();
        self.reload(rules);
        Ok(count)
    }

    /// Evaluate one event.
    ///
    /// # Errors
    /// Only [`FingerprintError::UnresolvedPlaceholder`](crate::FingerprintError::UnresolvedPlaceholder)
    /// under [`UnresolvedPolicy::Fail`](crate::UnresolvedPolicy::Fail).
    pub fn evaluate(&self, event: &Event) -> Result<GroupingOutcome> {
        let rules = self.store.load();
        self.evaluate_with(&rules, event)
    }

    /// Evaluate a batch against one snapshot of the rules. Results keep the
    /// input order.
    pub fn evaluate_batch(&self, events: &[Event]) -> Result<Vec<GroupingOutcome>> {
        let rules = self.store.load();
        let batch = &self.config.batch;

        if batch.enable_parallelism && events.len() >= batch.parallel_threshold {
            log::debug!(
                "evaluating {} events on {} threads",
                events.len(),
                rayon::current_num_threads()
            );
            events
                .par_iter()
                .map(|event| self.evaluate_with(&rules, event))
                .collect()
        } else {
            events
                .iter()
                .map(|event| self.evaluate_with(&rules, event))
                .collect()
        }
    }

    fn evaluate_with(&self, rules: &FingerprintingRules, event: &Event) -> Result<GroupingOutcome> {
        let matched_rule = select_rule(event, rules);

        let client_tokens;
        let template: Option<&[FingerprintToken]> = match &matched_rule {
            Some(result) => Some(result.rule.fingerprint.as_slice()),
            None if self.classifier.applies_client_fingerprint(event) => {
                client_tokens = self.client_tokens(event);
                Some(client_tokens.as_slice())
            }
            None => None,
        };

        let (values, fingerprint) = match template {
            Some(template) => self.renderer.render_values_and_fingerprint(
                template,
                event,
                self.config.unresolved_policy,
            )?,
            None => (Vec::new(), vec![self.renderer.default_component(event)]),
        };

        let variants = self
            .classifier
            .classify(matched_rule.as_ref(), &values, event);

        match &matched_rule {
            Some(result) => log::trace!("rule {} matched: {}", result.rule_index, result.text),
            None => log::trace!("no fingerprinting rule matched"),
        }

        Ok(GroupingOutcome {
            fingerprint,
            matched_rule,
            variants,
        })
    }

    /// Client fingerprint entries as templates. Entries with placeholders
    /// that cannot be parsed are taken literally.
    fn client_tokens(&self, event: &Event) -> Vec<FingerprintToken> {
        event
            .client_fingerprint()
            .unwrap_or_default()
            .iter()
            .map(|raw| {
                parse_token(raw, self.compiler.key_mapping()).unwrap_or_else(|e| {
                    log::debug!("client fingerprint entry {raw:?} kept literally: {e}");
                    FingerprintToken::literal(raw.as_str())
                })
            })
            .collect()
    }
}

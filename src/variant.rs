//! Grouping variant classification.
//!
//! Every evaluation yields the `app` and `system` default-grouping variants
//! and, when a custom fingerprint applies, a `custom-fingerprint` variant.
//! Exactly one of them contributes to grouping; every other variant carries
//! `contributes: false` and a hint naming what took precedence.

use crate::config::VariantConfig;
use crate::engine::MatchResult;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const APP_VARIANT: &str = "app";
pub const SYSTEM_VARIANT: &str = "system";
pub const CUSTOM_VARIANT: &str = "custom-fingerprint";

pub const HINT_CUSTOM_PRECEDENCE: &str = "custom fingerprint takes precedence";
pub const HINT_NO_IN_APP_FRAMES: &str = "none of the frames are in-app";
pub const HINT_APP_PRECEDENCE: &str = "app-only frames take precedence";

/// Variants keyed by name.
pub type Variants = BTreeMap<String, Variant>;

/// Outcome of one grouping strategy for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Variant {
    /// Default grouping component.
    Component {
        contributes: bool,
        hint: Option<String>,
    },
    /// Default grouping component salted with a custom prefix.
    SaltedComponent {
        contributes: bool,
        hint: Option<String>,
        values: Vec<String>,
        client_values: Vec<String>,
        matched_rule: Option<String>,
    },
    /// Custom fingerprint replacing default grouping. Always contributes.
    CustomFingerprint {
        values: Vec<String>,
        matched_rule: Option<String>,
        hint: Option<String>,
    },
}

impl Variant {
    pub fn contributes(&self) -> bool {
        match self {
            Variant::Component { contributes, .. }
            | Variant::SaltedComponent { contributes, .. } => *contributes,
            Variant::CustomFingerprint { .. } => true,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Variant::Component { hint, .. }
            | Variant::SaltedComponent { hint, .. }
            | Variant::CustomFingerprint { hint, .. } => hint.as_deref(),
        }
    }

    /// The `type` discriminator as serialized.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Component { .. } => "component",
            Variant::SaltedComponent { .. } => "salted-component",
            Variant::CustomFingerprint { .. } => "custom-fingerprint",
        }
    }

    fn suppressed(hint: &str) -> Self {
        Variant::Component {
            contributes: false,
            hint: Some(hint.to_string()),
        }
    }
}

/// The variant that contributes to grouping, if any.
pub fn contributing_variant(variants: &Variants) -> Option<(&str, &Variant)> {
    variants
        .iter()
        .find(|(_, variant)| variant.contributes())
        .map(|(name, variant)| (name.as_str(), variant))
}

/// `true` when `raw` contains a `{{ default }}` marker, whitespace-tolerant.
pub fn contains_default_marker(raw: &str) -> bool {
    let mut rest = raw;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            return false;
        };
        if rest[start + 2..start + 2 + len].trim() == "default" {
            return true;
        }
        rest = &rest[start + 2 + len + 2..];
    }
    false
}

/// `true` for a fingerprint that only asks for default grouping.
pub fn is_default_fingerprint(fingerprint: &[String]) -> bool {
    match fingerprint {
        [] => true,
        [only] => {
            let only = only.trim();
            only.starts_with("{{")
                && only.ends_with("}}")
                && only.matches("{{").count() == 1
                && contains_default_marker(only)
        }
        _ => false,
    }
}

struct CustomSource<'a> {
    client_values: Vec<String>,
    matched_rule: Option<&'a str>,
    salted: bool,
}

/// Decides which variants apply to an evaluation and which one contributes.
#[derive(Debug, Clone, Default)]
pub struct VariantClassifier {
    config: VariantConfig,
}

impl VariantClassifier {
    pub fn new(config: VariantConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VariantConfig {
        &self.config
    }

    /// Whether a fingerprint sent by the client replaces default grouping
    /// for this event when no rule matched.
    pub fn applies_client_fingerprint(&self, event: &Event) -> bool {
        self.config.honor_client_fingerprint
            && event
                .client_fingerprint()
                .is_some_and(|fp| !is_default_fingerprint(fp))
    }

    /// Classify an evaluation.
    ///
    /// `rendered` is the custom fingerprint after placeholder expansion with
    /// `{{ default }}` left in place; it is ignored when neither a rule nor
    /// a client fingerprint applies.
    pub fn classify(
        &self,
        match_result: Option<&MatchResult>,
        rendered: &[String],
        event: &Event,
    ) -> Variants {
        let source = match match_result {
            Some(result) => Some(CustomSource {
                client_values: result.rule.fingerprint.iter().map(|t| t.raw.clone()).collect(),
                matched_rule: Some(result.text.as_str()),
                salted: result.rule.is_salted(),
            }),
            None if self.applies_client_fingerprint(event) => {
                let client = event.client_fingerprint().unwrap_or_default();
                Some(CustomSource {
                    client_values: client.to_vec(),
                    matched_rule: None,
                    salted: client.iter().any(|v| contains_default_marker(v)),
                })
            }
            None => None,
        };

        match source {
            Some(source) if source.salted => self.salted(source, rendered),
            Some(source) => custom(source, rendered),
            None => default_grouping(event),
        }
    }

    fn salted(&self, source: CustomSource<'_>, rendered: &[String]) -> Variants {
        let precedence = self.config.salted_precedence;
        let loser_hint = format!("exception of {} takes precedence", precedence.winner());

        let variant = |contributes: bool, hint: Option<String>| Variant::SaltedComponent {
            contributes,
            hint,
            values: rendered.to_vec(),
            client_values: source.client_values.clone(),
            matched_rule: source.matched_rule.map(str::to_string),
        };

        let mut variants = Variants::new();
        variants.insert(precedence.winner().to_string(), variant(true, None));
        variants.insert(precedence.loser().to_string(), variant(false, Some(loser_hint)));
        variants
    }
}

fn custom(source: CustomSource<'_>, rendered: &[String]) -> Variants {
    let mut variants = Variants::new();
    variants.insert(
        CUSTOM_VARIANT.to_string(),
        Variant::CustomFingerprint {
            values: rendered.to_vec(),
            matched_rule: source.matched_rule.map(str::to_string),
            hint: None,
        },
    );
    variants.insert(APP_VARIANT.to_string(), Variant::suppressed(HINT_CUSTOM_PRECEDENCE));
    variants.insert(SYSTEM_VARIANT.to_string(), Variant::suppressed(HINT_CUSTOM_PRECEDENCE));
    variants
}

fn default_grouping(event: &Event) -> Variants {
    let winner = Variant::Component {
        contributes: true,
        hint: None,
    };

    let mut variants = Variants::new();
    if event.has_in_app_frames() {
        variants.insert(APP_VARIANT.to_string(), winner);
        variants.insert(SYSTEM_VARIANT.to_string(), Variant::suppressed(HINT_APP_PRECEDENCE));
    } else {
        variants.insert(APP_VARIANT.to_string(), Variant::suppressed(HINT_NO_IN_APP_FRAMES));
        variants.insert(SYSTEM_VARIANT.to_string(), winner);
    }
    variants
}

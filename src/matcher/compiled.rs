//! Pre-compiled rule matchers.

use crate::compiler::KeyMapping;
use crate::error::{FingerprintError, Result};
use crate::event::{Event, Family};
use crate::ir::{escape_quoted, MatchLevel, MatcherKey};
use crate::matcher::context::MatchCandidate;
use crate::matcher::glob::{GlobOptions, GlobPattern};

const ALL_LEVELS: [MatchLevel; 3] = [MatchLevel::Exception, MatchLevel::Frame, MatchLevel::Event];

#[derive(Debug, Clone)]
enum Comparison {
    Glob(GlobPattern),
    App(bool),
    Family { all: bool, families: Vec<Family> },
}

/// A single `key:"pattern"` test, compiled once at load time.
///
/// Evaluation fails closed: a candidate without the referenced field never
/// matches, negated or not.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    key: MatcherKey,
    pattern: String,
    negated: bool,
    comparison: Comparison,
}

impl CompiledMatcher {
    pub fn compile(key: MatcherKey, pattern: &str, negated: bool) -> Result<Self> {
        let comparison = match key {
            MatcherKey::App => Comparison::App(parse_bool(pattern)?),
            MatcherKey::Family => parse_families(pattern)?,
            _ => Comparison::Glob(GlobPattern::compile(
                pattern,
                GlobOptions {
                    case_insensitive: key.is_case_insensitive(),
                    path_like: key.is_path_like(),
                },
            )?),
        };

        Ok(Self {
            key,
            pattern: pattern.to_string(),
            negated,
            comparison,
        })
    }

    pub fn key(&self) -> &MatcherKey {
        &self.key
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn level(&self) -> MatchLevel {
        self.key.level()
    }

    pub fn matches_candidate(&self, candidate: &MatchCandidate<'_>) -> bool {
        let positive = match &self.comparison {
            Comparison::Glob(glob) => match candidate.text(&self.key) {
                Some(value) => glob.is_match(value),
                None => return false,
            },
            Comparison::App(expected) => match candidate.in_app() {
                Some(in_app) => in_app == *expected,
                None => return false,
            },
            Comparison::Family { all, families } => match candidate.family() {
                Some(family) => *all || families.contains(&family),
                None => return false,
            },
        };
        positive != self.negated
    }

    /// Whether any candidate of this matcher's level satisfies it.
    pub fn matches_event(&self, event: &Event) -> bool {
        MatchCandidate::all(event, self.level()).any(|c| self.matches_candidate(&c))
    }

    /// Key as it appears in the configuration structure (`!` when negated).
    pub fn config_key(&self) -> String {
        if self.negated {
            format!("!{}", self.key)
        } else {
            self.key.to_string()
        }
    }

    /// Text form, e.g. `!type:"DatabaseUnavailable"`.
    pub fn text(&self) -> String {
        format!("{}:\"{}\"", self.config_key(), escape_quoted(&self.pattern))
    }
}

/// Evaluate a conjunction of matchers against an event.
///
/// Matchers are grouped by level; for every level that has matchers, one
/// single candidate of that level has to satisfy all of them.
pub fn matches_all(matchers: &[CompiledMatcher], event: &Event) -> bool {
    ALL_LEVELS.iter().all(|&level| {
        let mut group = matchers.iter().filter(|m| m.level() == level).peekable();
        if group.peek().is_none() {
            return true;
        }
        MatchCandidate::all(event, level).any(|candidate| {
            matchers
                .iter()
                .filter(|m| m.level() == level)
                .all(|m| m.matches_candidate(&candidate))
        })
    })
}

/// Test one `matcher_key`/`pattern` pair against an event.
///
/// A leading `!` on the key negates the matcher. Key aliases such as
/// `error.type` are accepted.
///
/// ```rust
/// use fingerprint_engine::{matcher, Event};
///
/// let event = Event::builder().value("EndOfWorld: something went WRONG").build();
/// assert!(matcher::matches(&event, "value", "*went wrong*")?);
/// assert!(!matcher::matches(&event, "message", "*")?);
/// # Ok::<(), fingerprint_engine::FingerprintError>(())
/// ```
pub fn matches(event: &Event, matcher_key: &str, pattern: &str) -> Result<bool> {
    let (negated, key) = KeyMapping::default().resolve(matcher_key)?;
    let matcher = CompiledMatcher::compile(key, pattern, negated)?;
    Ok(matcher.matches_event(event))
}

fn parse_bool(pattern: &str) -> Result<bool> {
    match pattern.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Ok(true),
        "no" | "false" | "0" | "off" => Ok(false),
        _ => Err(FingerprintError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "expected yes or no".to_string(),
        }),
    }
}

fn parse_families(pattern: &str) -> Result<Comparison> {
    let mut all = false;
    let mut families = Vec::new();
    for name in pattern.split(',').map(str::trim) {
        match name.to_ascii_lowercase().as_str() {
            "all" => all = true,
            "native" => families.push(Family::Native),
            "javascript" => families.push(Family::Javascript),
            "other" => families.push(Family::Other),
            _ => {
                return Err(FingerprintError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: format!("unknown family {name:?}"),
                })
            }
        }
    }
    Ok(Comparison::Family { all, families })
}

//! Fingerprint template parsing and rendering.
//!
//! A fingerprint template is the ordered list of tokens a rule assigns,
//! e.g. `["something-went-wrong", "{{ error.value }}"]`. Each token may mix
//! literal text with `{{ name }}` placeholders; `{{ default }}` stands for
//! the default grouping component.

use crate::compiler::KeyMapping;
use crate::config::UnresolvedPolicy;
use crate::error::{FingerprintError, Result};
use crate::event::Event;
use crate::ir::{FingerprintToken, MatcherKey, TemplateSegment, DEFAULT_MARKER};
use std::fmt;
use std::sync::Arc;

/// Provider of the system default fingerprint component.
///
/// Default grouping lives outside this crate; callers plug it in here.
pub type DefaultComponentFn = Arc<dyn Fn(&Event) -> String + Send + Sync>;

/// Parse one authored fingerprint entry into its segments.
///
/// An unterminated `{{` is kept as literal text. Placeholder names go
/// through `keys`, and unknown or non-renderable names are rejected.
pub fn parse_token(raw: &str, keys: &KeyMapping) -> Result<FingerprintToken> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        literal.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + len].trim();
        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(parse_placeholder(name, raw, keys)?);
        rest = &rest[start + 2 + len + 2..];
    }

    literal.push_str(rest);
    if !literal.is_empty() || segments.is_empty() {
        segments.push(TemplateSegment::Literal(literal));
    }

    Ok(FingerprintToken {
        raw: raw.to_string(),
        segments,
    })
}

fn parse_placeholder(name: &str, raw: &str, keys: &KeyMapping) -> Result<TemplateSegment> {
    if name == "default" {
        return Ok(TemplateSegment::Default);
    }
    match keys.lookup(name) {
        Ok(key) if key.is_renderable() => Ok(TemplateSegment::Field(key)),
        _ => Err(FingerprintError::ConfigError(format!(
            "unknown fingerprint variable {name:?} in {raw:?}"
        ))),
    }
}

/// Rendering options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Keep `{{ default }}` verbatim instead of expanding it.
    pub keep_default: bool,
    pub policy: UnresolvedPolicy,
}

impl RenderOptions {
    pub fn strict() -> Self {
        Self {
            keep_default: false,
            policy: UnresolvedPolicy::Fail,
        }
    }
}

/// Expands fingerprint templates against events.
#[derive(Clone)]
pub struct TemplateRenderer {
    default_component: DefaultComponentFn,
}

impl fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Renderer whose default component is the literal `{{ default }}` marker.
    pub fn new() -> Self {
        Self {
            default_component: Arc::new(|_| DEFAULT_MARKER.to_string()),
        }
    }

    pub fn with_default_component(default_component: DefaultComponentFn) -> Self {
        Self { default_component }
    }

    /// The default grouping component for `event`.
    pub fn default_component(&self, event: &Event) -> String {
        (self.default_component)(event)
    }

    /// Render a template, failing on the first unresolvable placeholder.
    pub fn render(&self, template: &[FingerprintToken], event: &Event) -> Result<Vec<String>> {
        self.render_with(template, event, RenderOptions::strict())
    }

    /// Render placeholders but keep `{{ default }}` as authored.
    pub fn render_client_values(
        &self,
        template: &[FingerprintToken],
        event: &Event,
    ) -> Result<Vec<String>> {
        self.render_with(
            template,
            event,
            RenderOptions {
                keep_default: true,
                policy: UnresolvedPolicy::Fail,
            },
        )
    }

    pub fn render_with(
        &self,
        template: &[FingerprintToken],
        event: &Event,
        options: RenderOptions,
    ) -> Result<Vec<String>> {
        template
            .iter()
            .map(|token| self.render_token(token, event, options))
            .collect()
    }

    /// Render the authored values and the final fingerprint in one pass.
    ///
    /// The first vector keeps `{{ default }}` verbatim, the second expands
    /// it. Each placeholder is resolved once for both.
    pub fn render_values_and_fingerprint(
        &self,
        template: &[FingerprintToken],
        event: &Event,
        policy: UnresolvedPolicy,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut values = Vec::with_capacity(template.len());
        let mut fingerprint = Vec::with_capacity(template.len());

        for token in template {
            let mut value = String::new();
            let mut component = String::new();
            for segment in &token.segments {
                match resolve_segment(token, segment, event, policy)? {
                    Piece::Text(text) => {
                        value.push_str(text);
                        component.push_str(text);
                    }
                    Piece::Default => {
                        value.push_str(DEFAULT_MARKER);
                        component.push_str(&self.default_component(event));
                    }
                }
            }
            values.push(value);
            fingerprint.push(component);
        }

        Ok((values, fingerprint))
    }

    fn render_token(
        &self,
        token: &FingerprintToken,
        event: &Event,
        options: RenderOptions,
    ) -> Result<String> {
        let mut out = String::new();
        for segment in &token.segments {
            match resolve_segment(token, segment, event, options.policy)? {
                Piece::Text(text) => out.push_str(text),
                Piece::Default if options.keep_default => out.push_str(DEFAULT_MARKER),
                Piece::Default => out.push_str(&self.default_component(event)),
            }
        }
        Ok(out)
    }
}

enum Piece<'a> {
    Text(&'a str),
    Default,
}

fn resolve_segment<'a>(
    token: &'a FingerprintToken,
    segment: &'a TemplateSegment,
    event: &'a Event,
    policy: UnresolvedPolicy,
) -> Result<Piece<'a>> {
    match segment {
        TemplateSegment::Literal(text) => Ok(Piece::Text(text)),
        TemplateSegment::Default => Ok(Piece::Default),
        TemplateSegment::Field(key) => match (resolve_field(key, event), policy) {
            (Some(value), _) => Ok(Piece::Text(value)),
            (None, UnresolvedPolicy::Fail) => {
                Err(FingerprintError::UnresolvedPlaceholder(key.to_string()))
            }
            (None, UnresolvedPolicy::Empty) => {
                log::debug!(
                    "placeholder {} unresolved in {:?}, substituting empty string",
                    key,
                    token.raw
                );
                Ok(Piece::Text(""))
            }
        },
    }
}

/// Value a placeholder renders to. Exception fields come from the first
/// exception that has them. Frame fields come from the innermost frame that
/// has them, searching exception stacktraces before the thread stacktrace.
pub fn resolve_field<'a>(key: &MatcherKey, event: &'a Event) -> Option<&'a str> {
    match key {
        MatcherKey::Type => event.exception_type(),
        MatcherKey::Value => event.exception_value(),
        MatcherKey::Module => event.crash_frame_field(|f| f.module.as_deref()),
        MatcherKey::Function => event.crash_frame_field(|f| f.function.as_deref()),
        MatcherKey::Path => event.crash_frame_field(|f| f.path.as_deref()),
        MatcherKey::Package => event.crash_frame_field(|f| f.package.as_deref()),
        MatcherKey::Message => event.message(),
        MatcherKey::Logger => event.logger(),
        MatcherKey::Level => event.level(),
        MatcherKey::Transaction => event.transaction(),
        MatcherKey::Release => event.release(),
        MatcherKey::Sdk => event.sdk(),
        MatcherKey::Tag(tag) => event.tag(tag),
        MatcherKey::App | MatcherKey::Family => None,
    }
}

//! Glob pattern compilation.
//!
//! Rule patterns are shell-style globs: `*` matches any run of characters,
//! `?` a single character and `[...]` a character class (`[!...]` negates).
//! Path-like keys use path semantics instead: `*` and `?` stop at `/`,
//! `**` crosses separators and `**/` may match zero directories. Patterns
//! without any glob syntax skip the regex engine entirely.

use crate::error::{FingerprintError, Result};
use regex::{Regex, RegexBuilder};

/// Options controlling glob translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobOptions {
    pub case_insensitive: bool,
    pub path_like: bool,
}

#[derive(Debug, Clone)]
enum GlobKind {
    Literal(String),
    Regex(Regex),
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    options: GlobOptions,
    kind: GlobKind,
}

impl GlobPattern {
    pub fn compile(pattern: &str, options: GlobOptions) -> Result<Self> {
        let normalized = normalize(pattern, options);
        let kind = if is_literal(&normalized) {
            let literal = if options.case_insensitive {
                normalized.to_lowercase()
            } else {
                normalized.into_owned()
            };
            GlobKind::Literal(literal)
        } else {
            let translated = translate(&normalized, options.path_like);
            let regex = RegexBuilder::new(&translated)
                .case_insensitive(options.case_insensitive)
                .dot_matches_new_line(true)
                .build()
                .map_err(|e| FingerprintError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            GlobKind::Regex(regex)
        };

        Ok(Self {
            source: pattern.to_string(),
            options,
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, GlobKind::Literal(_))
    }

    /// Test a field value against the pattern. The whole value must match.
    pub fn is_match(&self, value: &str) -> bool {
        let value = normalize(value, self.options);
        match &self.kind {
            GlobKind::Literal(literal) if self.options.case_insensitive => {
                value.to_lowercase() == *literal
            }
            GlobKind::Literal(literal) => value == literal.as_str(),
            GlobKind::Regex(regex) => regex.is_match(&value),
        }
    }
}

fn normalize(input: &str, options: GlobOptions) -> std::borrow::Cow<'_, str> {
    if options.path_like && input.contains('\\') {
        std::borrow::Cow::Owned(input.replace('\\', "/"))
    } else {
        std::borrow::Cow::Borrowed(input)
    }
}

fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['*', '?', '['])
}

/// Translate a glob into an anchored regex source string.
fn translate(pattern: &str, path_like: bool) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if path_like && chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' if path_like => out.push_str("[^/]*"),
            '*' => {
                // Collapse runs of stars.
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' if path_like => out.push_str("[^/]"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end + 1;
                    continue;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&escape_char(c)),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Index of the `]` closing the class opened at `start`, if any. A `]`
/// directly after `[` or `[!` is part of the class.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

fn translate_class(body: &[char]) -> String {
    let (negated, body) = match body.first() {
        Some('!') => (true, &body[1..]),
        _ => (false, body),
    };

    let mut out = String::from("[");
    if negated {
        out.push('^');
    }
    // `-` forms a range only between two members, so a leading or trailing
    // dash is literal and `[--z]` spans `-` to `z`. Classes match `/` even in
    // path mode.
    let mut idx = 0;
    while idx < body.len() {
        out.push_str(&escape_char(body[idx]));
        if body.get(idx + 1) == Some(&'-') && idx + 2 < body.len() {
            out.push('-');
            out.push_str(&escape_char(body[idx + 2]));
            idx += 3;
        } else {
            idx += 1;
        }
    }
    out.push(']');
    out
}

fn escape_char(c: char) -> String {
    let mut buf = [0u8; 4];
    regex::escape(c.encode_utf8(&mut buf))
}

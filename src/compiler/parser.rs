//! Text rule syntax parsing.
//!
//! One rule per line:
//!
//! ```text
//! # comment
//! type:DatabaseUnavailable !path:"**/vendor/**" -> database-unavailable
//! value:"*went wrong*" -> "something-went-wrong", "{{ error.value }}" title="Wrong"
//! ```
//!
//! Matchers are `key:value` pairs before `->`, fingerprint entries follow it
//! separated by whitespace or commas, and `name=value` attributes close the
//! line. Values are bare words or double-quoted strings where `\"` and `\\`
//! are escapes.

use crate::error::{FingerprintError, Result};
use crate::ir::RuleConfig;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

/// Tokens of a single rule line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Word(String),
    Quoted(String),
    Colon,
    Equals,
    Comma,
    Arrow,
}

/// Split one line into tokens.
pub(crate) fn tokenize_line(line: &str, line_no: usize) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            ':' => {
                tokens.push(Token::Colon);
                chars.next();
            }
            '=' => {
                tokens.push(Token::Equals);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.peek().copied() {
                            Some(escaped) if escaped == '"' || escaped == '\\' => {
                                value.push(escaped);
                                chars.next();
                            }
                            _ => value.push('\\'),
                        },
                        _ => value.push(ch),
                    }
                }
                if !closed {
                    return Err(parse_error(line_no, "unterminated quoted string"));
                }
                tokens.push(Token::Quoted(value));
            }
            '-' if rest_starts_with(&chars, "->") => {
                chars.next();
                chars.next();
                tokens.push(Token::Arrow);
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, ':' | '=' | ',' | '"') {
                        break;
                    }
                    if ch == '-' && rest_starts_with(&chars, "->") {
                        break;
                    }
                    if ch == '{' && rest_starts_with(&chars, "{{") {
                        read_placeholder(&mut chars, &mut word, line_no)?;
                        continue;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

fn rest_starts_with(chars: &Peekable<Chars<'_>>, prefix: &str) -> bool {
    let mut ahead = chars.clone();
    prefix.chars().all(|c| ahead.next() == Some(c))
}

/// Copy a bare `{{ ... }}` placeholder into `word`, spaces included.
fn read_placeholder(
    chars: &mut Peekable<Chars<'_>>,
    word: &mut String,
    line_no: usize,
) -> Result<()> {
    word.push_str("{{");
    chars.next();
    chars.next();
    while chars.peek().is_some() {
        if rest_starts_with(chars, "}}") {
            word.push_str("}}");
            chars.next();
            chars.next();
            return Ok(());
        }
        if let Some(ch) = chars.next() {
            word.push(ch);
        }
    }
    Err(parse_error(line_no, "unterminated placeholder"))
}

fn parse_error(line: usize, message: impl Into<String>) -> FingerprintError {
    FingerprintError::ParseError {
        line,
        message: message.into(),
    }
}

/// Recursive descent parser over the tokens of one line.
pub(crate) struct RuleParser<'a> {
    tokens: &'a [Token],
    position: usize,
    line: usize,
}

impl<'a> RuleParser<'a> {
    pub(crate) fn new(tokens: &'a [Token], line: usize) -> Self {
        Self {
            tokens,
            position: 0,
            line,
        }
    }

    fn current_token(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.current_token().cloned();
        self.position += 1;
        token
    }

    fn expect_value(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            Some(Token::Word(value)) | Some(Token::Quoted(value)) => Ok(value),
            Some(other) => Err(parse_error(
                self.line,
                format!("expected {what}, found {other:?}"),
            )),
            None => Err(parse_error(self.line, format!("expected {what}"))),
        }
    }

    pub(crate) fn parse_rule(&mut self) -> Result<RuleConfig> {
        let matchers = self.parse_matchers()?;
        let fingerprint = self.parse_fingerprint()?;
        let attributes = self.parse_attributes()?;
        Ok(RuleConfig {
            matchers,
            fingerprint,
            attributes,
        })
    }

    fn parse_matchers(&mut self) -> Result<Vec<(String, String)>> {
        let mut matchers = Vec::new();
        loop {
            match self.advance() {
                Some(Token::Arrow) => break,
                Some(Token::Word(key)) => {
                    if self.advance() != Some(Token::Colon) {
                        return Err(parse_error(
                            self.line,
                            format!("expected ':' after matcher key {key:?}"),
                        ));
                    }
                    let pattern = match self.current_token() {
                        Some(Token::Word(_)) | Some(Token::Quoted(_)) => {
                            self.expect_value("matcher pattern")?
                        }
                        _ => String::new(),
                    };
                    matchers.push((key, pattern));
                }
                Some(other) => {
                    return Err(parse_error(
                        self.line,
                        format!("expected matcher, found {other:?}"),
                    ))
                }
                None => return Err(parse_error(self.line, "expected '->'")),
            }
        }

        if matchers.is_empty() {
            return Err(parse_error(self.line, "rule has no matchers"));
        }
        Ok(matchers)
    }

    fn parse_fingerprint(&mut self) -> Result<Vec<String>> {
        let mut fingerprint = Vec::new();
        while let Some(token) = self.current_token() {
            match token {
                Token::Comma => {
                    self.advance();
                }
                Token::Word(_) if self.peek_token(1) == Some(&Token::Equals) => break,
                Token::Word(_) | Token::Quoted(_) => {
                    fingerprint.push(self.expect_value("fingerprint value")?);
                }
                other => {
                    return Err(parse_error(
                        self.line,
                        format!("unexpected {other:?} in fingerprint"),
                    ))
                }
            }
        }

        if fingerprint.is_empty() {
            return Err(parse_error(self.line, "rule has an empty fingerprint"));
        }
        Ok(fingerprint)
    }

    fn parse_attributes(&mut self) -> Result<BTreeMap<String, String>> {
        let mut attributes = BTreeMap::new();
        while self.current_token().is_some() {
            let name = self.expect_value("attribute name")?;
            if self.advance() != Some(Token::Equals) {
                return Err(parse_error(
                    self.line,
                    format!("expected '=' after attribute {name:?}"),
                ));
            }
            let value = self.expect_value("attribute value")?;
            attributes.insert(name, value);
        }
        Ok(attributes)
    }
}

/// Parse a whole rules document into configuration structures.
///
/// Blank lines and lines starting with `#` are skipped. Line numbers in
/// errors are 1-based.
pub(crate) fn parse_rules(text: &str) -> Result<Vec<RuleConfig>> {
    let mut rules = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_no = index + 1;
        let tokens = tokenize_line(trimmed, line_no)?;
        rules.push(RuleParser::new(&tokens, line_no).parse_rule()?);
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: &str) -> Token {
        Token::Word(value.to_string())
    }

    fn quoted(value: &str) -> Token {
        Token::Quoted(value.to_string())
    }

    #[test]
    fn test_tokenize_simple_rule() {
        let tokens = tokenize_line("type:DatabaseUnavailable -> database-unavailable", 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                word("type"),
                Token::Colon,
                word("DatabaseUnavailable"),
                Token::Arrow,
                word("database-unavailable"),
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_escapes() {
        let tokens = tokenize_line(r#"message:"say \"hi\" C:\tmp \\x""#, 1).unwrap();
        assert_eq!(tokens[2], quoted(r#"say "hi" C:\tmp \x"#));
    }

    #[test]
    fn test_tokenize_arrow_without_spaces() {
        let tokens = tokenize_line("type:A->b", 1).unwrap();
        assert_eq!(
            tokens,
            vec![word("type"), Token::Colon, word("A"), Token::Arrow, word("b")]
        );
    }

    #[test]
    fn test_tokenize_keeps_single_dash() {
        let tokens = tokenize_line("-> my-route", 1).unwrap();
        assert_eq!(tokens, vec![Token::Arrow, word("my-route")]);
    }

    #[test]
    fn test_tokenize_unicode_whitespace() {
        let tokens = tokenize_line("type:A\u{a0}-> b\u{3000}c", 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                word("type"),
                Token::Colon,
                word("A"),
                Token::Arrow,
                word("b"),
                word("c"),
            ]
        );
        assert!(tokenize_line("\u{b}\u{c}", 1).unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_bare_placeholder() {
        let tokens = tokenize_line("-> my-route, {{ default }} x{{ error.type }}y", 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Arrow,
                word("my-route"),
                Token::Comma,
                word("{{ default }}"),
                word("x{{ error.type }}y"),
            ]
        );
    }

    #[test]
    fn test_tokenize_unterminated_bare_placeholder() {
        match tokenize_line("type:A -> {{ default", 4) {
            Err(FingerprintError::ParseError { line, message }) => {
                assert_eq!(line, 4);
                assert!(message.contains("placeholder"));
            }
            other => panic!("Expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        match tokenize_line(r#"type:"oops -> x"#, 7) {
            Err(FingerprintError::ParseError { line, message }) => {
                assert_eq!(line, 7);
                assert!(message.contains("unterminated"));
            }
            other => panic!("Expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rule_with_attributes() {
        let rules = parse_rules(
            r#"value:"*went wrong*" !app:no -> "something-went-wrong", "{{ error.value }}" title="Wrong thing""#,
        )
        .unwrap();

        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(
            rule.matchers,
            vec![
                ("value".to_string(), "*went wrong*".to_string()),
                ("!app".to_string(), "no".to_string()),
            ]
        );
        assert_eq!(
            rule.fingerprint,
            vec!["something-went-wrong", "{{ error.value }}"]
        );
        assert_eq!(rule.attributes["title"], "Wrong thing");
    }

    #[test]
    fn test_parse_empty_pattern() {
        let rules = parse_rules(r#"message:"" -> empty-message"#).unwrap();
        assert_eq!(rules[0].matchers[0].1, "");

        let rules = parse_rules("message: -> empty-message").unwrap();
        assert_eq!(rules[0].matchers[0].1, "");
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let rules = parse_rules(
            "\n# database errors\n  type:DatabaseUnavailable -> db\n\n   # trailing\n",
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].fingerprint, vec!["db"]);
    }

    #[test]
    fn test_parse_error_reports_line() {
        match parse_rules("type:A -> a\n\ntype:B b") {
            Err(FingerprintError::ParseError { line, .. }) => assert_eq!(line, 3),
            other => panic!("Expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_missing_matchers() {
        assert!(matches!(
            parse_rules("-> orphan"),
            Err(FingerprintError::ParseError { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_empty_fingerprint() {
        assert!(parse_rules("type:A ->").is_err());
        assert!(parse_rules("type:A -> title=x").is_err());
    }

    #[test]
    fn test_parse_rejects_broken_attribute() {
        assert!(parse_rules("type:A -> a title=").is_err());
    }
}

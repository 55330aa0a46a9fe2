//! Lexical masking.
//!
//! String literals, quoted identifiers and comments are swapped out for
//!  opaque `__MASK_<n>__` words before any rewriting happens, so no rule can
//!  ever fire on literal text. The side table restores them at the end.

use std::borrow::Cow;

use crate::{
    error::{Error, Result},
    lex::{Lexer, TokenType},
    placeholders::TAG_PREFIX,
};

const PREFIX: &str = "__MASK_";
const SUFFIX: &str = "__";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpanKind {
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    LineComment,
    HashComment,
    BlockComment,
    /// A literal created by a rewrite rule (format strings, interval units)
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedSpan {
    pub kind: SpanKind,
    pub original: String,
}

impl MaskedSpan {
    /// The text that goes back into the query. Quoted strings come back
    ///  byte-identical; backtick identifiers become standard double-quoted
    ///  identifiers and `#` comments become `--` comments.
    pub fn restore(&self) -> Cow<'_, str> {
        match self.kind {
            SpanKind::Backtick => {
                let name = unquote(&self.original, '`');
                Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
            }
            SpanKind::HashComment => Cow::Owned(format!("--{}", &self.original[1..])),
            _ => Cow::Borrowed(&self.original),
        }
    }

    /// The identifier name if this span is a quoted identifier. MySQL
    ///  double-quoted text is a string unless ANSI_QUOTES is on; callers
    ///  that ask here have already decided it sits in identifier position.
    pub fn identifier(&self) -> Option<String> {
        match self.kind {
            SpanKind::Backtick => Some(unquote(&self.original, '`')),
            SpanKind::DoubleQuoted => Some(unquote(&self.original, '"')),
            _ => None,
        }
    }

    /// The decoded contents if this span is a string literal.
    pub fn string_value(&self) -> Option<String> {
        let quote = match self.kind {
            SpanKind::SingleQuoted => '\'',
            SpanKind::DoubleQuoted => '"',
            SpanKind::Generated if self.original.starts_with('\'') => '\'',
            _ => return None,
        };
        Some(unescape(&self.original, quote))
    }

    pub fn is_string(&self) -> bool {
        self.string_value().is_some()
    }
}

/// Strips the surrounding quotes and undoes doubled-quote escapes.
fn unquote(s: &str, quote: char) -> String {
    let inner = s
        .strip_prefix(quote)
        .and_then(|s| s.strip_suffix(quote))
        .unwrap_or(s);
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// Decodes a MySQL string literal: doubled quotes plus the backslash escapes.
fn unescape(s: &str, quote: char) -> String {
    let inner = s
        .strip_prefix(quote)
        .and_then(|s| s.strip_suffix(quote))
        .unwrap_or(s);
    let mut res = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => res.push('\n'),
                Some('t') => res.push('\t'),
                Some('r') => res.push('\r'),
                Some('0') => res.push('\0'),
                // \% and \_ keep their backslash (LIKE escapes)
                Some(c @ ('%' | '_')) => {
                    res.push('\\');
                    res.push(c);
                }
                Some(c) => res.push(c),
                None => res.push('\\'),
            },
            c if c == quote && chars.peek() == Some(&quote) => {
                chars.next();
                res.push(quote);
            }
            c => res.push(c),
        }
    }
    res
}

/// Quotes [value] as a standard single-quoted SQL string.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[derive(Debug, Clone, Default)]
pub struct MaskedQuery {
    pub text: String,
    spans: Vec<MaskedSpan>,
}

/// Masks every literal, quoted identifier and comment in [raw]. Fails on
///  unterminated literals and block comments: masking the rest of the query
///  would be guesswork.
pub fn mask(raw: &str) -> Result<MaskedQuery> {
    let mut masked = MaskedQuery {
        text: String::with_capacity(raw.len()),
        spans: Vec::new(),
    };
    let mut lexer = Lexer::new(raw);
    let mut last = 0;
    while let Some(token) = lexer.next_token()? {
        if token.ty == TokenType::Word {
            let word = lexer.source_of(&token);
            // Would be taken for a mask or a parameter tag on the way out
            if word.contains(PREFIX) || word.contains(TAG_PREFIX) {
                return Err(Error::ReservedWord {
                    word: word.to_string(),
                    offset: token.start,
                });
            }
        }
        if !token.is_opaque() {
            continue;
        }
        let original = lexer.source_of(&token);
        let kind = match token.ty {
            TokenType::StringSingleQuote => SpanKind::SingleQuoted,
            TokenType::StringDoubleQuote => SpanKind::DoubleQuoted,
            TokenType::Backtick => SpanKind::Backtick,
            TokenType::LineComment if original.starts_with('#') => SpanKind::HashComment,
            TokenType::LineComment => SpanKind::LineComment,
            _ => SpanKind::BlockComment,
        };
        masked.text.push_str(&raw[last..token.start]);
        let placeholder = masked.push(kind, original.to_string());
        masked.text.push_str(&placeholder);
        last = token.end;
    }
    masked.text.push_str(&raw[last..]);
    Ok(masked)
}

impl MaskedQuery {
    fn push(&mut self, kind: SpanKind, original: String) -> String {
        let id = self.spans.len();
        self.spans.push(MaskedSpan { kind, original });
        format!("{PREFIX}{id}{SUFFIX}")
    }

    /// Registers a literal produced by a rewrite and returns its placeholder,
    ///  so later passes treat it as opaque like any other literal. The same
    ///  literal always gets the same placeholder, so two identical rewrites
    ///  stay textually identical.
    pub fn push_literal(&mut self, literal: String) -> String {
        let existing = self
            .spans
            .iter()
            .position(|s| s.kind == SpanKind::Generated && s.original == literal);
        match existing {
            Some(id) => format!("{PREFIX}{id}{SUFFIX}"),
            None => self.push(SpanKind::Generated, literal),
        }
    }

    pub fn spans(&self) -> &[MaskedSpan] {
        &self.spans
    }

    /// Looks up the span behind a placeholder word such as `__MASK_3__`.
    pub fn span(&self, word: &str) -> Option<&MaskedSpan> {
        let id: usize = word
            .strip_prefix(PREFIX)?
            .strip_suffix(SUFFIX)?
            .parse()
            .ok()?;
        self.spans.get(id)
    }

    pub fn is_comment(&self, word: &str) -> bool {
        self.span(word).is_some_and(|s| {
            matches!(
                s.kind,
                SpanKind::LineComment | SpanKind::HashComment | SpanKind::BlockComment
            )
        })
    }

    /// Decoded contents when [word] is a masked string literal.
    pub fn string_value(&self, word: &str) -> Option<String> {
        self.span(word.trim()).and_then(MaskedSpan::string_value)
    }

    /// A placeholder usable as a PostgreSQL string: single-quoted literals
    ///  are returned as-is, double-quoted MySQL strings are re-quoted.
    pub fn as_pg_string(&mut self, word: &str) -> Option<String> {
        let word = word.trim();
        let span = self.span(word)?;
        match span.kind {
            SpanKind::SingleQuoted | SpanKind::Generated if span.is_string() => {
                Some(word.to_string())
            }
            SpanKind::DoubleQuoted => {
                let value = span.string_value()?;
                Some(self.push_literal(quote_literal(&value)))
            }
            _ => None,
        }
    }

    /// Name of a plain or quoted identifier word.
    pub fn identifier(&self, word: &str) -> Option<String> {
        if word.starts_with(PREFIX) {
            self.span(word).and_then(MaskedSpan::identifier)
        } else {
            Some(word.to_string())
        }
    }

    /// Replaces every placeholder in [text] with its restored span. Unknown
    ///  ids are left alone.
    pub fn unmask(&self, text: &str) -> String {
        let mut res = String::with_capacity(text.len() + 16);
        let mut rest = text;
        while let Some(pos) = rest.find(PREFIX) {
            res.push_str(&rest[..pos]);
            let after = &rest[pos + PREFIX.len()..];
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            let span = after[digits..]
                .starts_with(SUFFIX)
                .then(|| after[..digits].parse::<usize>().ok())
                .flatten()
                .and_then(|id| self.spans.get(id));
            match span {
                Some(span) => {
                    res.push_str(&span.restore());
                    rest = &after[digits + SUFFIX.len()..];
                }
                None => {
                    res.push_str(PREFIX);
                    rest = after;
                }
            }
        }
        res.push_str(rest);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::lex::QuoteKind;

    #[test]
    fn masks_literals_and_comments() {
        let raw = "SELECT 'a?b', `col` FROM t -- trailing ?\nWHERE x = ? /* ? */";
        let masked = mask(raw).unwrap();
        assert_eq!(
            masked.text,
            "SELECT __MASK_0__, __MASK_1__ FROM t __MASK_2__\nWHERE x = ? __MASK_3__"
        );
        assert_eq!(masked.spans().len(), 4);
        assert_eq!(masked.spans()[2].kind, SpanKind::LineComment);
    }

    #[test]
    fn unmask_restores_original_text() {
        let raw = "SELECT 'it''s', \"dq\" /* c */ FROM t";
        let masked = mask(raw).unwrap();
        assert_eq!(masked.unmask(&masked.text), raw);
    }

    #[test]
    fn unmask_fixes_dialect_quoting() {
        let raw = "SELECT `weird\"name` FROM t # note";
        let masked = mask(raw).unwrap();
        assert_eq!(
            masked.unmask(&masked.text),
            "SELECT \"weird\"\"name\" FROM t -- note"
        );
    }

    #[test]
    fn unmask_ignores_unknown_ids() {
        let masked = mask("SELECT 1").unwrap();
        assert_eq!(masked.unmask("x __MASK_9__ y"), "x __MASK_9__ y");
        assert_eq!(masked.unmask("x __MASK_ y"), "x __MASK_ y");
    }

    #[test]
    fn unterminated_is_fatal() {
        assert_eq!(
            mask("SELECT * FROM t WHERE a = 'oops").unwrap_err(),
            Error::UnterminatedLiteral {
                kind: QuoteKind::Single,
                offset: 26
            }
        );
        assert!(matches!(
            mask("SELECT 1 /* never closed").unwrap_err(),
            Error::UnterminatedComment { .. }
        ));
    }

    #[test]
    fn internal_names_are_rejected() {
        assert_eq!(
            mask("SELECT __MASK_0__, 'x' FROM t").unwrap_err(),
            Error::ReservedWord {
                word: "__MASK_0__".into(),
                offset: 7,
            }
        );
        assert!(matches!(
            mask("SELECT a FROM t WHERE b = x__PARAM_0__"),
            Err(Error::ReservedWord { offset: 26, .. })
        ));
        // quoted, they are ordinary text
        let raw = "SELECT '__MASK_0__', `__PARAM_1__` FROM t -- __MASK_0__";
        let masked = mask(raw).unwrap();
        assert_eq!(masked.unmask(&masked.text), "SELECT '__MASK_0__', \"__PARAM_1__\" FROM t -- __MASK_0__");
    }

    #[test]
    fn string_values() {
        let mut masked = mask(r#"SELECT 'a\'b', "c""d", `e`"#).unwrap();
        assert_eq!(masked.string_value("__MASK_0__").as_deref(), Some("a'b"));
        assert_eq!(masked.string_value("__MASK_1__").as_deref(), Some("c\"d"));
        assert_eq!(masked.string_value("__MASK_2__"), None);
        assert_eq!(masked.identifier("__MASK_2__").as_deref(), Some("e"));

        let requoted = masked.as_pg_string("__MASK_1__").unwrap();
        assert_eq!(masked.unmask(&requoted), "'c\"d'");
        assert_eq!(masked.as_pg_string("__MASK_0__").as_deref(), Some("__MASK_0__"));
    }

    #[test]
    fn generated_literals_are_opaque() {
        let mut masked = mask("SELECT 1").unwrap();
        let placeholder = masked.push_literal(quote_literal("it's"));
        assert_eq!(placeholder, "__MASK_0__");
        assert_eq!(masked.unmask(&placeholder), "'it''s'");
        assert_eq!(masked.string_value(&placeholder).as_deref(), Some("it's"));
        assert_eq!(masked.push_literal(quote_literal("it's")), placeholder);
        assert_eq!(masked.push_literal(quote_literal("other")), "__MASK_1__");
    }

    #[test]
    fn comments_are_recognised() {
        let masked = mask("SELECT a /* c */, 'x' # tail").unwrap();
        assert!(masked.is_comment("__MASK_0__"));
        assert!(!masked.is_comment("__MASK_1__"));
        assert!(masked.is_comment("__MASK_2__"));
        assert!(!masked.is_comment("a"));
    }
}

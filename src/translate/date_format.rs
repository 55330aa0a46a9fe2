//! MySQL `DATE_FORMAT`/`STR_TO_DATE` format strings to PostgreSQL
//!  `TO_CHAR`/`TO_DATE` templates.

use std::sync::LazyLock;

use regex::Regex;

/// `%x` specifiers, or runs of anything else.
static FORMAT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)%(.)|%$|[^%]+").expect("valid format regex"));

/// (MySQL specifier, TO_CHAR pattern, is a time field)
const EXACT: &[(char, &str, bool)] = &[
    ('a', "Dy", false),
    ('b', "Mon", false),
    ('c', "FMMM", false),
    ('D', "FMDDth", false),
    ('d', "DD", false),
    ('e', "FMDD", false),
    ('f', "US", true),
    ('H', "HH24", true),
    ('h', "HH12", true),
    ('I', "HH12", true),
    ('i', "MI", true),
    ('j', "DDD", false),
    ('k', "FMHH24", true),
    ('l', "FMHH12", true),
    ('M', "FMMonth", false),
    ('m', "MM", false),
    ('p', "AM", true),
    ('r', "HH12:MI:SS AM", true),
    ('S', "SS", true),
    ('s', "SS", true),
    ('T', "HH24:MI:SS", true),
    ('v', "IW", false),
    ('W', "FMDay", false),
    ('x', "IYYY", false),
    ('Y', "YYYY", false),
    ('y', "YY", false),
];

/// Specifiers whose week numbering or day numbering doesn't line up exactly.
const APPROXIMATE: &[(char, &str)] = &[
    ('U', "WW"),
    ('u', "IW"),
    ('V', "IW"),
    ('w', "D"),
    ('X', "IYYY"),
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PgFormat {
    /// The template, unquoted
    pub pattern: String,
    /// True if any hour/minute/second field appears
    pub has_time: bool,
    /// Specifiers with no equivalent, copied as literal text
    pub unknown: Vec<String>,
    /// Specifiers mapped to a close but not identical pattern
    pub approximate: Vec<String>,
}

/// Literal text in a template must be double-quoted or its letters could be
///  read as patterns.
fn push_literal_text(out: &mut String, text: &str) {
    let mut in_quotes = false;
    for c in text.chars() {
        let quote = c.is_ascii_alphabetic() || c == '"' || c == '\\';
        if quote && !in_quotes {
            out.push('"');
            in_quotes = true;
        } else if !quote && in_quotes {
            out.push('"');
            in_quotes = false;
        }
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    if in_quotes {
        out.push('"');
    }
}

pub fn translate_format(mysql: &str) -> PgFormat {
    let mut res = PgFormat::default();
    for captures in FORMAT_TOKEN.captures_iter(mysql) {
        let whole = &captures[0];
        if !whole.starts_with('%') {
            push_literal_text(&mut res.pattern, whole);
            continue;
        }
        // A lone trailing % is literal in MySQL
        let Some(specifier) = captures.get(1).and_then(|m| m.as_str().chars().next()) else {
            res.pattern.push('%');
            continue;
        };
        if specifier == '%' {
            res.pattern.push('%');
        } else if let Some((_, pattern, is_time)) = EXACT.iter().find(|(c, ..)| *c == specifier) {
            res.pattern.push_str(pattern);
            res.has_time |= is_time;
        } else if let Some((_, pattern)) = APPROXIMATE.iter().find(|(c, _)| *c == specifier) {
            res.pattern.push_str(pattern);
            res.approximate.push(format!("%{specifier}"));
        } else {
            // MySQL prints the character itself for unknown specifiers
            push_literal_text(&mut res.pattern, &specifier.to_string());
            res.unknown.push(format!("%{specifier}"));
        }
    }
    res
}

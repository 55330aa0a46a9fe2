//! Literal-level fixes that don't depend on any function rule: integer
//!  booleans, collation clauses, and the `BINARY` comparison modifier.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    config::ConversionConfig,
    error::Result,
    lex::{TokenList, TokenType},
    mask::MaskedQuery,
    translate::{Replacement, apply_edits},
};

/// MySQL collation names: charset, optional language/version parts, then a
///  `_ci`, `_cs` or `_bin` suffix.
static MYSQL_COLLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z][a-z0-9]*(?:_[a-z0-9]+)*_(?:ci|cs|bin)$").expect("valid collation regex")
});

pub fn is_mysql_collation(name: &str) -> bool {
    MYSQL_COLLATION.is_match(name)
}

/// End offset of the token before [index], or the token's own start.
fn previous_end(list: &TokenList<'_>, index: usize) -> usize {
    let start = list.get(index).map(|t| t.start).unwrap_or(0);
    index
        .checked_sub(1)
        .and_then(|i| list.get(i))
        .map(|t| t.end)
        .unwrap_or(start)
}

/// Removes `COLLATE <mysql collation>` along with the whitespace before it.
///  Collation names PostgreSQL might know (`"C"`, `"en_US"`) are kept.
pub fn strip_collations(text: &str, mask: &MaskedQuery) -> Result<String> {
    let list = TokenList::new(text)?;
    let mut edits = Vec::new();
    for i in 0..list.len() {
        if !list.is_keyword(i, "COLLATE") {
            continue;
        }
        let word = list.text(i + 1);
        let name = match list.ty(i + 1) {
            Some(TokenType::Word) => mask
                .identifier(word)
                .or_else(|| mask.string_value(word)),
            _ => None,
        };
        if let Some(name) = name
            && is_mysql_collation(&name)
            && let Some(end) = list.get(i + 1).map(|t| t.end)
        {
            edits.push(Replacement {
                start: previous_end(&list, i),
                end,
                text: String::new(),
            });
        }
    }
    Ok(apply_edits(text, edits))
}

/// Drops MySQL's `BINARY` comparison modifier (`WHERE BINARY a = b`):
///  PostgreSQL comparisons are already case and byte exact.
pub fn strip_binary(text: &str) -> Result<String> {
    let list = TokenList::new(text)?;
    let mut edits = Vec::new();
    for i in 0..list.len() {
        if !list.is_keyword(i, "BINARY") || list.is_qualified(i) {
            continue;
        }
        // CAST(x AS BINARY), CONVERT(x, BINARY), column named binary
        let type_position = i > 0
            && (list.is_keyword(i - 1, "AS") || list.ty(i - 1) == Some(TokenType::Comma));
        let operand_follows = matches!(
            list.ty(i + 1),
            Some(TokenType::Word | TokenType::ParenLeft | TokenType::Number)
        ) && !list.is_keyword(i + 1, "FROM");
        if type_position || !operand_follows {
            continue;
        }
        if let (Some(binary), Some(next)) = (list.get(i), list.get(i + 1)) {
            edits.push(Replacement {
                start: binary.start,
                end: next.start,
                text: String::new(),
            });
        }
    }
    Ok(apply_edits(text, edits))
}

/// `col = 1` => `col = TRUE` (and `0`/`FALSE`, `!=`, `<>`) for configured
///  boolean columns. The column may be qualified or quoted.
pub fn booleans(text: &str, mask: &MaskedQuery, config: &ConversionConfig) -> Result<String> {
    let list = TokenList::new(text)?;
    let is_arithmetic = |index: usize| {
        list.ty(index) == Some(TokenType::Operator)
            && matches!(list.text(index), "+" | "-" | "*" | "/" | "%" | "||")
    };
    let literal = |index: usize| match (list.ty(index), list.text(index)) {
        (Some(TokenType::Number), "1") => Some("TRUE"),
        (Some(TokenType::Number), "0") => Some("FALSE"),
        _ => None,
    };
    let is_boolean = |index: usize| {
        list.ty(index) == Some(TokenType::Word)
            && mask
                .identifier(list.text(index))
                .is_some_and(|name| config.is_boolean_column(&name))
    };

    let mut edits = Vec::new();
    for i in 1..list.len() {
        if list.ty(i) != Some(TokenType::Operator) || !matches!(list.text(i), "=" | "!=" | "<>") {
            continue;
        }
        // `flag = 1`; `flag = 1 + x` compares against an expression
        let forward = literal(i + 1)
            .filter(|_| !is_arithmetic(i + 2) && is_boolean(i - 1))
            .map(|text| (i + 1, text));
        // `1 = flag` or `1 = t.flag`
        let reversed = || {
            let column = if list.ty(i + 2) == Some(TokenType::Dot) { i + 3 } else { i + 1 };
            if list.ty(column + 1) == Some(TokenType::Dot)
                || list.ty(column + 1) == Some(TokenType::ParenLeft)
                || is_arithmetic(column + 1)
                || (i >= 2 && is_arithmetic(i - 2))
                || !is_boolean(column)
            {
                return None;
            }
            literal(i - 1).map(|text| (i - 1, text))
        };
        if let Some((number, text)) = forward.or_else(reversed)
            && let Some(number) = list.get(number)
        {
            edits.push(Replacement {
                start: number.start,
                end: number.end,
                text: text.to_string(),
            });
        }
    }
    Ok(apply_edits(text, edits))
}

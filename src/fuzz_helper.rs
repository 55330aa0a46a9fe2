//! Invariant checks shared by the fuzz targets and the end to end tests.
//!  Every check panics, so the fuzzer reports the input that broke it.

use crate::{
    convert::{convert, test_conversion},
    lex::{TokenType, tokenize},
    normalize::is_mysql_collation,
};

/// Asserts what must hold for any successful conversion of [raw].
pub fn check_conversion(raw: &str, converted: &str) {
    let tokens = match tokenize(converted) {
        Ok(tokens) => tokens,
        Err(e) => panic!("output doesn't lex ({e}): {raw:?} => {converted:?}"),
    };

    let mut depth = 0i64;
    for (i, token) in tokens.iter().enumerate() {
        match token.ty {
            TokenType::ParenLeft => depth += 1,
            TokenType::ParenRight => depth -= 1,
            TokenType::Question => panic!("`?` left in output: {raw:?} => {converted:?}"),
            TokenType::Word if converted[token.start..token.end].eq_ignore_ascii_case("COLLATE") => {
                if let Some(next) = tokens.get(i + 1)
                    && next.ty == TokenType::Word
                {
                    assert!(
                        !is_mysql_collation(&converted[next.start..next.end]),
                        "collation left in output: {raw:?} => {converted:?}"
                    );
                }
            }
            _ => {}
        }
        assert!(depth >= 0, "unbalanced output: {raw:?} => {converted:?}");
    }
    assert_eq!(depth, 0, "unbalanced output: {raw:?} => {converted:?}");
}

/// Converts arbitrary text. Structural errors are fine; panics are not.
pub fn convert_text(input: &str) {
    if let Ok(res) = test_conversion(input) {
        check_conversion(input, &res.converted);
    }
}

/// Converts with one parameter per `?` and checks that every output value
///  is one of the inputs.
pub fn convert_with_params(input: &str, params: &[u32]) {
    if let Ok(res) = convert(input, params) {
        check_conversion(input, &res.query);
        assert!(
            res.params.len() >= params.len(),
            "parameters dropped: {input:?}"
        );
        assert!(
            res.params.iter().all(|p| params.contains(p)),
            "parameter fabricated: {input:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_good_output() {
        check_conversion("SELECT IFNULL(a, ?)", "SELECT COALESCE(a, $1)");
        convert_with_params("SELECT * FROM t WHERE a = ? LIMIT ?, ?", &[1, 2, 3]);
        convert_text("SELECT 'unterminated");
    }

    #[test]
    #[should_panic(expected = "unbalanced output")]
    fn rejects_unbalanced_output() {
        check_conversion("SELECT f(a)", "SELECT f(a");
    }

    #[test]
    #[should_panic(expected = "collation left")]
    fn rejects_collations() {
        check_conversion("x COLLATE utf8_bin", "x COLLATE utf8_bin");
    }
}

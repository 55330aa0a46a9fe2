//! `?` placeholders to `$n`.
//!
//! Tagging happens right after masking: every `?` becomes `__PARAM_<i>__`
//!  where `i` is its index in the caller's parameter list. The tags ride
//!  through every rewrite (including the projection pass, which may copy
//!  them), and [renumber] turns them into `$k` at the very end, building the
//!  parameter list to match.

use crate::{
    config::ParamMode,
    diagnostics::{ConversionWarning, Diagnostics, Severity, codes},
    error::Result,
    lex::{Lexer, TokenType},
};

pub const TAG_PREFIX: &str = "__PARAM_";
const TAG_SUFFIX: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged {
    pub text: String,
    /// Number of `?` found
    pub count: usize,
    /// True if the text already had `$n` placeholders
    pub has_numbered: bool,
}

/// Index behind a tag word, if [word] is one.
pub fn tag_index(word: &str) -> Option<usize> {
    word.strip_prefix(TAG_PREFIX)?
        .strip_suffix(TAG_SUFFIX)?
        .parse()
        .ok()
}

/// Tags every `?` in masked [text]. Masked literals can't contain one.
pub fn tag(text: &str) -> Result<Tagged> {
    let mut res = Tagged {
        text: String::with_capacity(text.len() + 16),
        count: 0,
        has_numbered: false,
    };
    let mut lexer = Lexer::new(text);
    let mut last = 0;
    while let Some(token) = lexer.next_token()? {
        match token.ty {
            TokenType::Question => {
                res.text.push_str(&text[last..token.start]);
                res.text.push_str(&format!("{TAG_PREFIX}{}{TAG_SUFFIX}", res.count));
                res.count += 1;
                last = token.end;
            }
            TokenType::NumberedParam => res.has_numbered = true,
            _ => {}
        }
    }
    res.text.push_str(&text[last..]);
    Ok(res)
}

/// Replaces tags with `?` again, for warning snippets.
pub fn untag(text: &str) -> String {
    let mut res = String::with_capacity(text.len());
    let mut lexer = Lexer::new(text);
    let mut last = 0;
    while let Ok(Some(token)) = lexer.next_token() {
        if token.ty == TokenType::Word && tag_index(lexer.source_of(&token)).is_some() {
            res.push_str(&text[last..token.start]);
            res.push('?');
            last = token.end;
        }
    }
    res.push_str(&text[last..]);
    res
}

#[derive(Debug, Clone, PartialEq)]
pub struct Renumbered<V> {
    pub text: String,
    pub params: Vec<V>,
}

/// Numbers the tags in [text] as `$1..$n` by order of appearance and lines
///  [params] up with them. [tagged] is the number of `?` the input had.
///
/// Values are only ever moved or (in [ParamMode::Duplicate]) copied. Values
///  no placeholder refers to are appended after the referenced ones, in their
///  original order, so the output never has fewer values than the input.
pub fn renumber<V: Clone>(
    text: &str,
    params: &[V],
    tagged: usize,
    mode: ParamMode,
    diagnostics: &mut Diagnostics,
) -> Result<Renumbered<V>> {
    if tagged != params.len() {
        diagnostics.push(ConversionWarning::new(
            Severity::Info,
            codes::PARAM_COUNT,
            format!(
                "query has {tagged} placeholders but {} parameters were bound",
                params.len()
            ),
        ));
    }

    let mut out = String::with_capacity(text.len());
    let mut out_params = Vec::with_capacity(params.len());
    // original index => $k, for ParamMode::Reuse
    let mut numbers: Vec<Option<usize>> = vec![None; tagged.max(params.len())];
    let mut used = vec![false; params.len()];
    let mut next = 1;

    let mut lexer = Lexer::new(text);
    let mut last = 0;
    while let Some(token) = lexer.next_token()? {
        if token.ty != TokenType::Word {
            continue;
        }
        let Some(index) = tag_index(lexer.source_of(&token)) else {
            continue;
        };
        if index >= numbers.len() {
            numbers.resize(index + 1, None);
        }
        let number = match (mode, numbers[index]) {
            (ParamMode::Reuse, Some(number)) => number,
            _ => {
                let number = next;
                next += 1;
                numbers[index] = Some(number);
                if let Some(value) = params.get(index) {
                    out_params.push(value.clone());
                    used[index] = true;
                }
                number
            }
        };
        out.push_str(&text[last..token.start]);
        out.push_str(&format!("${number}"));
        last = token.end;
    }
    out.push_str(&text[last..]);

    out_params.extend(
        params
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(value, _)| value.clone()),
    );
    Ok(Renumbered {
        text: out,
        params: out_params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tags_question_marks() {
        let tagged = tag("SELECT * FROM t WHERE a = ? AND b IN (?, ?) AND c = $1").unwrap();
        assert_eq!(
            tagged.text,
            "SELECT * FROM t WHERE a = __PARAM_0__ AND b IN (__PARAM_1__, __PARAM_2__) AND c = $1"
        );
        assert_eq!(tagged.count, 3);
        assert!(tagged.has_numbered);
        assert_eq!(untag(&tagged.text), "SELECT * FROM t WHERE a = ? AND b IN (?, ?) AND c = $1");
    }

    #[test]
    fn renumbers_in_order_of_appearance() {
        let mut diagnostics = Diagnostics::new();
        let out = renumber(
            "LIMIT __PARAM_1__ OFFSET __PARAM_0__",
            &[10, 20],
            2,
            ParamMode::Reuse,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(out.text, "LIMIT $1 OFFSET $2");
        assert_eq!(out.params, vec![20, 10]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn duplicated_tags() {
        let text = "SELECT (a + __PARAM_0__) AS x WHERE b = __PARAM_1__ GROUP BY (a + __PARAM_0__)";

        let mut diagnostics = Diagnostics::new();
        let reuse = renumber(text, &["p", "q"], 2, ParamMode::Reuse, &mut diagnostics).unwrap();
        assert_eq!(
            reuse.text,
            "SELECT (a + $1) AS x WHERE b = $2 GROUP BY (a + $1)"
        );
        assert_eq!(reuse.params, vec!["p", "q"]);

        let dup = renumber(text, &["p", "q"], 2, ParamMode::Duplicate, &mut diagnostics).unwrap();
        assert_eq!(
            dup.text,
            "SELECT (a + $1) AS x WHERE b = $2 GROUP BY (a + $3)"
        );
        assert_eq!(dup.params, vec!["p", "q", "p"]);
    }

    #[test]
    fn count_mismatch_is_a_warning() {
        let mut diagnostics = Diagnostics::new();
        let out = renumber("a = __PARAM_0__", &[1, 2, 3], 1, ParamMode::Reuse, &mut diagnostics)
            .unwrap();
        assert_eq!(out.text, "a = $1");
        assert_eq!(out.params, vec![1, 2, 3]);
        assert_eq!(diagnostics.iter().next().map(|w| w.code), Some(codes::PARAM_COUNT));

        let mut diagnostics = Diagnostics::new();
        let out = renumber(
            "a = __PARAM_0__ AND b = __PARAM_1__",
            &[1],
            2,
            ParamMode::Reuse,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(out.text, "a = $1 AND b = $2");
        assert_eq!(out.params, vec![1]);
        assert_eq!(diagnostics.len(), 1);
    }
}

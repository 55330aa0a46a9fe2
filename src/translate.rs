//! The rule engine: an ordered table of rules, each matching either a MySQL
//!  function call (name followed by a balanced argument list) or a keyword,
//!  applied to masked text.

use tracing::trace;

use crate::{
    diagnostics::{Diagnostics, codes},
    error::Result,
    lex::{TokenList, TokenType},
    mask::MaskedQuery,
    mysql_functions::{self, MysqlFunction},
};

pub mod date_format;
pub mod postgres;

/// Mutable state the rewriters may touch: the mask table (to register new
///  literals or read existing ones) and the warning list.
pub struct RuleContext<'a> {
    pub mask: &'a mut MaskedQuery,
    pub diagnostics: &'a mut Diagnostics,
}

/// A matched function call. All text is masked text.
#[derive(Debug)]
pub struct Call<'t> {
    pub function: MysqlFunction,
    /// The whole call, name through closing paren
    pub source: &'t str,
    inner: &'t str,
    args: Vec<&'t str>,
}

impl<'t> Call<'t> {
    /// Everything between the parentheses, untrimmed.
    pub fn inner(&self) -> &'t str {
        self.inner
    }

    /// `NOW()` has zero arguments, not one empty one.
    pub fn arg_count(&self) -> usize {
        if self.args.len() == 1 && self.args[0].trim().is_empty() {
            0
        } else {
            self.args.len()
        }
    }

    /// Argument [index], trimmed ("" when missing).
    pub fn arg(&self, index: usize) -> &'t str {
        self.raw_arg(index).trim()
    }

    /// Argument [index] with its surrounding whitespace.
    pub fn raw_arg(&self, index: usize) -> &'t str {
        self.args.get(index).copied().unwrap_or("")
    }
}

/// Byte range of the current text to replace, and the new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Returns the replacement for the whole call, or None to leave it as is
///  (after recording a warning if the call can't be translated).
pub type CallRewriter = fn(&Call<'_>, &mut RuleContext<'_>) -> Option<String>;

/// Called with the token index of the matched keyword.
pub type KeywordRewriter = fn(&TokenList<'_>, usize, &mut RuleContext<'_>) -> Option<Replacement>;

#[derive(Clone, Copy)]
pub enum Matcher {
    Call(&'static [MysqlFunction], CallRewriter),
    Keyword(&'static str, KeywordRewriter),
}

#[derive(Clone, Copy)]
pub struct ConversionRule {
    pub name: &'static str,
    pub matcher: Matcher,
}

impl ConversionRule {
    fn try_at(
        &self,
        list: &TokenList<'_>,
        index: usize,
        cx: &mut RuleContext<'_>,
    ) -> Result<Option<Replacement>> {
        if list.ty(index) != Some(TokenType::Word) || list.is_qualified(index) {
            return Ok(None);
        }
        match self.matcher {
            Matcher::Keyword(keyword, rewrite) => {
                if !list.is_keyword(index, keyword) {
                    return Ok(None);
                }
                Ok(rewrite(list, index, cx))
            }
            Matcher::Call(functions, rewrite) => {
                if list.ty(index + 1) != Some(TokenType::ParenLeft) {
                    return Ok(None);
                }
                let Some(function) = MysqlFunction::from_name(list.text(index))
                    .filter(|f| functions.contains(f))
                else {
                    return Ok(None);
                };
                let close = list.matching_paren(index + 1)?;
                let call = call_at(list, function, index, close);
                let start = list.get(index).map(|t| t.start).unwrap_or(0);
                let end = list.get(close).map(|t| t.end).unwrap_or(start);
                Ok(rewrite(&call, cx).map(|text| Replacement { start, end, text }))
            }
        }
    }
}

/// Builds the call for the name at [name] whose argument list closes at
///  [close].
fn call_at<'t>(
    list: &TokenList<'t>,
    function: MysqlFunction,
    name: usize,
    close: usize,
) -> Call<'t> {
    let source = list.source();
    let start = list.get(name).map(|t| t.start).unwrap_or(0);
    let open_end = list.get(name + 1).map(|t| t.end).unwrap_or(start);
    let close_start = list.get(close).map(|t| t.start).unwrap_or(open_end);
    let close_end = list.get(close).map(|t| t.end).unwrap_or(close_start);

    let depth = list.depth(name + 1) + 1;
    let mut args = Vec::new();
    let mut arg_start = open_end;
    for i in name + 2..close {
        if list.ty(i) == Some(TokenType::Comma)
            && list.depth(i) == depth
            && let Some(comma) = list.get(i)
        {
            args.push(&source[arg_start..comma.start]);
            arg_start = comma.end;
        }
    }
    args.push(&source[arg_start..close_start]);

    Call {
        function,
        source: &source[start..close_end],
        inner: &source[open_end..close_start],
        args,
    }
}

/// Runs every rule over [text], in table order. Each rule scans right to
///  left, so nested calls of the same function are rewritten inside-out and
///  a rewrite never moves text the scan hasn't reached yet.
pub fn apply(text: String, rules: &[ConversionRule], cx: &mut RuleContext<'_>) -> Result<String> {
    let mut text = text;
    for rule in rules {
        text = apply_rule(text, rule, cx)?;
    }
    Ok(text)
}

fn apply_rule(mut text: String, rule: &ConversionRule, cx: &mut RuleContext<'_>) -> Result<String> {
    let mut limit = None;
    loop {
        let found = {
            let list = TokenList::new(&text)?;
            let mut found = None;
            for i in (0..limit.unwrap_or(list.len())).rev() {
                if let Some(replacement) = rule.try_at(&list, i, cx)? {
                    // Tokens before the replacement survive it unchanged
                    let resume = (0..=i)
                        .find(|&j| list.get(j).is_some_and(|t| t.start >= replacement.start))
                        .unwrap_or(i);
                    found = Some((resume, replacement));
                    break;
                }
            }
            found
        };
        let Some((resume, replacement)) = found else {
            return Ok(text);
        };
        trace!(
            rule = rule.name,
            from = &text[replacement.start..replacement.end],
            to = %replacement.text,
            "applied rule"
        );
        text.replace_range(replacement.start..replacement.end, &replacement.text);
        limit = Some(resume);
    }
}

/// Reports calls that survived the rule table but look like MySQL helpers.
pub fn flag_leftovers(text: &str, cx: &mut RuleContext<'_>) -> Result<()> {
    let list = TokenList::new(text)?;
    for i in 0..list.len() {
        if list.ty(i) == Some(TokenType::Word)
            && list.ty(i + 1) == Some(TokenType::ParenLeft)
            && !list.is_qualified(i)
            && mysql_functions::looks_mysql_specific(list.text(i))
        {
            let close = list.matching_paren(i + 1)?;
            cx.diagnostics.info(
                codes::SUSPICIOUS_FUNCTION,
                format!("{} is not a PostgreSQL function", list.text(i)),
                list.slice(i, close),
            );
        }
    }
    Ok(())
}

/// Parenthesizes [expr] unless it is already a single operand: a name,
///  number, placeholder, call, or parenthesized group.
pub fn wrap(expr: &str) -> String {
    let expr = expr.trim();
    if is_atomic(expr) {
        expr.to_string()
    } else {
        format!("({expr})")
    }
}

fn is_atomic(expr: &str) -> bool {
    let Ok(list) = TokenList::new(expr) else {
        return false;
    };
    let last = match list.len() {
        0 => return false,
        n => n - 1,
    };
    let closes_at = |open: usize| list.matching_paren(open).is_ok_and(|close| close == last);
    match list.ty(0) {
        Some(TokenType::Number | TokenType::NumberedParam) => last == 0,
        Some(TokenType::ParenLeft) => closes_at(0),
        Some(TokenType::Word) if list.ty(1) == Some(TokenType::ParenLeft) => closes_at(1),
        // a, t.a, s.t.a
        Some(TokenType::Word) => (0..=last).all(|i| {
            let want = if i % 2 == 0 { TokenType::Word } else { TokenType::Dot };
            list.ty(i) == Some(want)
        }) && last % 2 == 0,
        _ => false,
    }
}

/// Puts [new] where the trimmed part of [raw] was, keeping raw's
///  surrounding whitespace.
pub fn replace_trimmed(raw: &str, new: &str) -> String {
    let leading = &raw[..raw.len() - raw.trim_start().len()];
    let trailing = &raw[raw.trim_end().len()..];
    format!("{leading}{new}{trailing}")
}

/// Index of the first [keyword] at paren depth [depth] in `from..to`.
pub fn find_keyword(
    list: &TokenList<'_>,
    keyword: &str,
    from: usize,
    to: usize,
    depth: u32,
) -> Option<usize> {
    (from..to).find(|&i| list.depth(i) == depth && list.is_keyword(i, keyword))
}

/// Applies non-overlapping edits, last first so earlier offsets stay valid.
pub fn apply_edits(text: &str, mut edits: Vec<Replacement>) -> String {
    let mut res = text.to_string();
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    for edit in edits {
        res.replace_range(edit.start..edit.end, &edit.text);
    }
    res
}

/// Source text of tokens `from..to` (exclusive), trimmed; "" when empty.
pub fn range_text<'t>(list: &TokenList<'t>, from: usize, to: usize) -> &'t str {
    if from >= to {
        ""
    } else {
        list.slice(from, to - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::mask;
    use pretty_assertions::assert_eq;

    fn upper_rule(call: &Call<'_>, _cx: &mut RuleContext<'_>) -> Option<String> {
        Some(format!("UPPER({})", call.inner()))
    }

    fn coalesce_rule(call: &Call<'_>, _cx: &mut RuleContext<'_>) -> Option<String> {
        Some(format!("COALESCE({})", call.inner()))
    }

    const RULES: &[ConversionRule] = &[
        ConversionRule {
            name: "ucase",
            matcher: Matcher::Call(&[MysqlFunction::UCASE], upper_rule),
        },
        ConversionRule {
            name: "ifnull",
            matcher: Matcher::Call(&[MysqlFunction::IFNULL], coalesce_rule),
        },
    ];

    fn run(sql: &str) -> Result<String> {
        let mut masked = mask(sql)?;
        let mut diagnostics = Diagnostics::new();
        let mut cx = RuleContext {
            mask: &mut masked,
            diagnostics: &mut diagnostics,
        };
        let text = cx.mask.text.clone();
        let out = apply(text, RULES, &mut cx)?;
        Ok(masked.unmask(&out))
    }

    #[test]
    fn nested_calls() {
        assert_eq!(
            run("SELECT ucase(IFNULL(ucase(a), IFNULL(b, 'ucase(c)'))) FROM t").unwrap(),
            "SELECT UPPER(COALESCE(UPPER(a), COALESCE(b, 'ucase(c)'))) FROM t"
        );
    }

    #[test]
    fn qualified_names_and_bare_words_are_skipped() {
        assert_eq!(
            run("SELECT s.ucase(a), ucase FROM t").unwrap(),
            "SELECT s.ucase(a), ucase FROM t"
        );
    }

    #[test]
    fn unbalanced_call_is_structural() {
        assert!(run("SELECT IFNULL(a, (b) FROM t").is_err());
    }

    #[test]
    fn call_arguments() {
        let list = TokenList::new("f( a , g(b, c),  )").unwrap();
        let call = call_at(&list, MysqlFunction::IF, 0, 11);
        assert_eq!(call.arg_count(), 3);
        assert_eq!(call.arg(1), "g(b, c)");
        assert_eq!(call.raw_arg(0), " a ");
        assert_eq!(call.arg(2), "");
        assert_eq!(call.inner(), " a , g(b, c),  ");
        assert_eq!(call.source, "f( a , g(b, c),  )");

        let list = TokenList::new("NOW()").unwrap();
        assert_eq!(call_at(&list, MysqlFunction::NOW, 0, 2).arg_count(), 0);
    }

    #[test]
    fn wrapping() {
        assert_eq!(wrap(" t.col "), "t.col");
        assert_eq!(wrap("__PARAM_0__"), "__PARAM_0__");
        assert_eq!(wrap("COALESCE(a, b)"), "COALESCE(a, b)");
        assert_eq!(wrap("(a) + (b)"), "((a) + (b))");
        assert_eq!(wrap("a + 1"), "(a + 1)");
        assert_eq!(wrap("-1"), "(-1)");
        assert_eq!(wrap("t."), "(t.)");
    }

    #[test]
    fn trimmed_replacement() {
        assert_eq!(replace_trimmed("  'x' \n", "'y'"), "  'y' \n");
        assert_eq!(replace_trimmed("x", "y"), "y");
    }
}

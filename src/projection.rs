//! Projection consistency: PostgreSQL won't group by a select-list alias
//!  the way MySQL does, and every non-aggregated `ORDER BY` expression must
//!  match the grouping set exactly. This pass rewrites alias references in
//!  `GROUP BY` and `HAVING` to the aliased expression, then makes `ORDER BY`
//!  agree with whatever `GROUP BY` now says.
//!
//! #Notes
//! Every `SELECT` is handled on its own, innermost first: parenthesized
//!  subqueries are fixed (recursively) before the statement around them,
//!  and a compound query is split into its `UNION`/`INTERSECT`/`EXCEPT`
//!  branches.

use tracing::trace;

use crate::{
    diagnostics::{Diagnostics, codes},
    error::Result,
    lex::{TokenList, TokenType},
    mask::MaskedQuery,
    mysql_functions,
    placeholders::tag_index,
    translate::{Replacement, apply_edits, range_text},
};

/// Words that end a select item instead of naming it, or can't be an alias.
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "COLLATE", "CROSS", "DESC", "DISTINCT",
    "DIV", "ELSE", "END", "ESCAPE", "EXISTS", "FALSE", "FILTER", "FOR", "FROM", "GROUP", "HAVING",
    "ILIKE", "IN", "INNER", "INTERVAL", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LIMIT", "MOD",
    "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER", "PARTITION", "REGEXP",
    "RIGHT", "RLIKE", "SELECT", "THEN", "TRUE", "UNION", "USING", "WHEN", "WHERE", "WINDOW",
    "WITH", "XOR",
];

/// Select modifiers that may precede the first item.
const MODIFIERS: &[&str] = &[
    "ALL",
    "DISTINCT",
    "DISTINCTROW",
    "HIGH_PRIORITY",
    "STRAIGHT_JOIN",
    "SQL_SMALL_RESULT",
    "SQL_BIG_RESULT",
    "SQL_BUFFER_RESULT",
    "SQL_CACHE",
    "SQL_NO_CACHE",
    "SQL_CALC_FOUND_ROWS",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    From,
    Where,
    GroupBy,
    Having,
    Window,
    OrderBy,
    Limit,
    Offset,
    For,
    Into,
    Lock,
}

#[derive(Debug, Clone, Copy)]
struct ClauseRange {
    clause: Clause,
    /// Index of the clause keyword
    start: usize,
    /// First token after the keyword(s)
    body: usize,
    /// One past the last token of the clause
    end: usize,
}

/// Depth-0 clauses of the select starting at [select], in order.
fn clauses(list: &TokenList<'_>, select: usize, end: usize) -> Vec<ClauseRange> {
    let mut found: Vec<ClauseRange> = Vec::new();
    let mut i = select + 1;
    while i < end {
        if list.depth(i) != 0 || list.ty(i) != Some(TokenType::Word) {
            i += 1;
            continue;
        }
        let two = |first: &str, clause: Clause| {
            list.keywords_at(i, &[first, "BY"]).map(|body| (clause, body))
        };
        let single = [
            ("FROM", Clause::From),
            ("WHERE", Clause::Where),
            ("HAVING", Clause::Having),
            ("WINDOW", Clause::Window),
            ("LIMIT", Clause::Limit),
            ("OFFSET", Clause::Offset),
            ("FOR", Clause::For),
            ("INTO", Clause::Into),
            ("LOCK", Clause::Lock),
        ]
        .into_iter()
        .find(|(kw, _)| list.is_keyword(i, kw))
        .map(|(_, clause)| (clause, i + 1));

        match two("GROUP", Clause::GroupBy)
            .or_else(|| two("ORDER", Clause::OrderBy))
            .or(single)
        {
            Some((clause, body)) => {
                if let Some(prev) = found.last_mut() {
                    prev.end = i;
                }
                found.push(ClauseRange {
                    clause,
                    start: i,
                    body,
                    end,
                });
                i = body;
            }
            None => i += 1,
        }
    }
    found
}

#[derive(Debug, Clone)]
struct SelectAlias {
    /// Unquoted, lowercased
    name: String,
    /// Masked source text of the aliased expression
    expr: String,
    /// Comparison form of [expr]
    normalized: String,
    aggregate: bool,
    /// The expression reads a column with the alias's own name
    shadows_column: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Missing,
    Unique(usize),
    Ambiguous,
}

/// What one `SELECT` knows about its aliases, and which of them the
///  `GROUP BY` pass expanded.
#[derive(Debug, Default)]
pub struct GroupingContext {
    aliases: Vec<SelectAlias>,
    expanded: Vec<usize>,
}

impl GroupingContext {
    fn lookup(&self, name: &str) -> Lookup {
        let mut matches = self
            .aliases
            .iter()
            .enumerate()
            .filter(|(_, a)| a.name.eq_ignore_ascii_case(name))
            .map(|(i, _)| i);
        match (matches.next(), matches.next()) {
            (None, _) => Lookup::Missing,
            (Some(i), None) => Lookup::Unique(i),
            _ => Lookup::Ambiguous,
        }
    }

    fn expanded_by_name(&self, name: &str) -> Option<&SelectAlias> {
        self.expanded
            .iter()
            .map(|&i| &self.aliases[i])
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    fn expanded_by_expr(&self, normalized: &str) -> Option<&SelectAlias> {
        self.expanded
            .iter()
            .map(|&i| &self.aliases[i])
            .find(|a| a.normalized == normalized)
    }

    pub fn expanded_count(&self) -> usize {
        self.expanded.len()
    }
}

/// `(expr)`, unless expr is already one parenthesized group.
fn paren(expr: &str) -> String {
    let expr = expr.trim();
    let enclosed = TokenList::new(expr).is_ok_and(|list| {
        list.ty(0) == Some(TokenType::ParenLeft)
            && list.matching_paren(0).is_ok_and(|close| close + 1 == list.len())
    });
    if enclosed {
        expr.to_string()
    } else {
        format!("({expr})")
    }
}

/// Comparison form of an expression: table qualifiers dropped, outer
///  parentheses dropped, case folded outside literals, whitespace collapsed.
fn normalize_expr(expr: &str, mask: &MaskedQuery) -> String {
    let Ok(list) = TokenList::new(expr) else {
        return expr.trim().to_ascii_lowercase();
    };
    let (mut from, mut to) = (0, list.len());
    while to > from + 1
        && list.ty(from) == Some(TokenType::ParenLeft)
        && list.matching_paren(from).is_ok_and(|close| close + 1 == to)
    {
        from += 1;
        to -= 1;
    }
    let mut parts = Vec::new();
    let mut i = from;
    while i < to {
        let text = list.text(i);
        if list.ty(i) == Some(TokenType::Word)
            && list.ty(i + 1) == Some(TokenType::Dot)
            && i + 2 < to
        {
            i += 2;
            continue;
        }
        let part = match mask.span(text) {
            Some(span) if span.is_string() => span.original.clone(),
            Some(span) => span
                .identifier()
                .map(|name| name.to_ascii_lowercase())
                .unwrap_or_else(|| span.original.clone()),
            None => text.to_ascii_lowercase(),
        };
        parts.push(part);
        i += 1;
    }
    parts.join(" ")
}

/// `t.col`, `col`, `` `t`.`col` ``
fn is_column_ref(list: &TokenList<'_>, from: usize, to: usize) -> bool {
    to > from
        && (to - from) % 2 == 1
        && (from..to).all(|i| {
            let want = if (i - from) % 2 == 0 {
                TokenType::Word
            } else {
                TokenType::Dot
            };
            list.ty(i) == Some(want)
        })
}

/// Drops trailing comment placeholders from `from..to`.
fn trim_comments(list: &TokenList<'_>, from: usize, mut to: usize, mask: &MaskedQuery) -> usize {
    while to > from && mask.is_comment(list.text(to - 1)) {
        to -= 1;
    }
    to
}

/// The alias of a select item and where its expression ends.
fn parse_alias(
    list: &TokenList<'_>,
    from: usize,
    to: usize,
    mask: &MaskedQuery,
) -> Option<(String, usize)> {
    let to = trim_comments(list, from, to, mask);
    if to < from + 2 {
        return None;
    }
    let last = to - 1;
    let word = list.text(last);
    if list.ty(last) != Some(TokenType::Word) || is_reserved(word) || tag_index(word).is_some() {
        return None;
    }
    if list.is_keyword(last - 1, "AS") {
        // MySQL also takes a string as an alias
        let name = mask.identifier(word).or_else(|| mask.string_value(word))?;
        return (last - 1 > from).then_some((name, last - 1));
    }
    let name = mask.identifier(word)?;
    let implicit = match list.ty(last - 1) {
        Some(TokenType::ParenRight | TokenType::Number) => true,
        Some(TokenType::Word) => {
            let prev = list.text(last - 1);
            !is_reserved(prev)
                || ["END", "NULL", "TRUE", "FALSE"]
                    .iter()
                    .any(|k| k.eq_ignore_ascii_case(prev))
        }
        _ => false,
    };
    implicit.then_some((name, last))
}

fn has_aggregate(list: &TokenList<'_>, from: usize, to: usize) -> bool {
    (from..to).any(|i| {
        list.ty(i) == Some(TokenType::Word)
            && (list.is_keyword(i, "OVER")
                || (list.ty(i + 1) == Some(TokenType::ParenLeft)
                    && mysql_functions::is_aggregate(list.text(i))))
    })
}

fn reads_column(list: &TokenList<'_>, from: usize, to: usize, name: &str, mask: &MaskedQuery) -> bool {
    (from..to).any(|i| {
        list.ty(i) == Some(TokenType::Word)
            && !matches!(list.ty(i + 1), Some(TokenType::ParenLeft | TokenType::Dot))
            && mask
                .identifier(list.text(i))
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
    })
}

fn collect_aliases(
    list: &TokenList<'_>,
    from: usize,
    to: usize,
    mask: &MaskedQuery,
) -> GroupingContext {
    let mut start = from;
    while start < to && MODIFIERS.iter().any(|m| list.is_keyword(start, m)) {
        start += 1;
    }
    let mut cx = GroupingContext::default();
    for (item_from, item_to) in list.split_commas(start, to, 0) {
        let Some((name, expr_end)) = parse_alias(list, item_from, item_to, mask) else {
            continue;
        };
        let expr = range_text(list, item_from, expr_end).to_string();
        let shadows_column = !is_column_ref(list, item_from, expr_end)
            && reads_column(list, item_from, expr_end, &name, mask);
        cx.aliases.push(SelectAlias {
            normalized: normalize_expr(&expr, mask),
            aggregate: has_aggregate(list, item_from, expr_end),
            name,
            expr,
            shadows_column,
        });
    }
    cx
}

fn token_range(list: &TokenList<'_>, from: usize, to: usize) -> Option<(usize, usize)> {
    Some((list.get(from)?.start, list.get(to.checked_sub(1)?)?.end))
}

/// Rewrites one `GROUP BY` item if it names an alias.
/// The name a `GROUP BY` item refers to, when the item is a single word.
fn group_item_name(list: &TokenList<'_>, from: usize, to: usize, mask: &MaskedQuery) -> Option<String> {
    let to = trim_comments(list, from, to, mask);
    if to != from + 1 || list.ty(from) != Some(TokenType::Word) {
        return None;
    }
    mask.identifier(list.text(from))
}

fn expand_group_item(
    list: &TokenList<'_>,
    from: usize,
    to: usize,
    cx: &mut GroupingContext,
    mask: &MaskedQuery,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let name = group_item_name(list, from, to, mask)?;
    match cx.lookup(&name) {
        Lookup::Missing | Lookup::Ambiguous => None,
        Lookup::Unique(index) => {
            let alias = &cx.aliases[index];
            if alias.aggregate {
                diagnostics.unsupported(
                    codes::AGGREGATE_ALIAS,
                    format!("GROUP BY {name} refers to an aggregate; left unchanged"),
                    &alias.expr,
                );
                return None;
            }
            if alias.shadows_column {
                diagnostics.info(
                    codes::ALIAS_SHADOWS_COLUMN,
                    format!(
                        "alias {name} reuses the name of a column its expression reads; MySQL \
                         groups by the column, the aliased expression is used here; review manually"
                    ),
                    &alias.expr,
                );
            }
            trace!(alias = %name, "expanding GROUP BY alias");
            let expanded = paren(&alias.expr);
            cx.expanded.push(index);
            Some(expanded)
        }
    }
}

fn fix_group_by(
    list: &TokenList<'_>,
    clause: &ClauseRange,
    cx: &mut GroupingContext,
    mask: &MaskedQuery,
    diagnostics: &mut Diagnostics,
    edits: &mut Vec<Replacement>,
) {
    let mut end = trim_comments(list, clause.body, clause.end, mask);
    let rollup = end >= clause.body + 2 && list.keywords_at(end - 2, &["WITH", "ROLLUP"]).is_some();
    if rollup {
        end -= 2;
    }
    let spans = list.split_commas(clause.body, end, 0);
    // One ambiguous name leaves the whole clause as written
    if let Some(name) = spans.iter().find_map(|&(from, to)| {
        group_item_name(list, from, to, mask).filter(|name| cx.lookup(name) == Lookup::Ambiguous)
    }) {
        diagnostics.unsupported(
            codes::AMBIGUOUS_ALIAS,
            format!("GROUP BY {name} matches more than one select alias; clause left unchanged"),
            range_text(list, clause.body, clause.end),
        );
        return;
    }
    let mut items = Vec::new();
    for (from, to) in spans {
        let expanded = expand_group_item(list, from, to, cx, mask, diagnostics);
        items.push((from, to, expanded));
    }

    if rollup {
        // GROUP BY a, b WITH ROLLUP => GROUP BY ROLLUP (a, b)
        let joined: Vec<String> = items
            .iter()
            .map(|(from, to, expanded)| {
                expanded
                    .clone()
                    .unwrap_or_else(|| range_text(list, *from, *to).to_string())
            })
            .collect();
        if let (Some(first), Some(rollup)) = (list.get(clause.body), list.get(end + 1)) {
            edits.push(Replacement {
                start: first.start,
                end: rollup.end,
                text: format!("ROLLUP ({})", joined.join(", ")),
            });
        }
        return;
    }
    for (from, to, expanded) in items {
        if let Some(text) = expanded
            && let Some((start, end)) = token_range(list, from, to)
        {
            edits.push(Replacement { start, end, text });
        }
    }
}

fn fix_having(
    list: &TokenList<'_>,
    clause: &ClauseRange,
    cx: &GroupingContext,
    mask: &MaskedQuery,
    diagnostics: &mut Diagnostics,
    edits: &mut Vec<Replacement>,
) {
    let mut next = clause.body;
    while next < clause.end {
        let i = next;
        next += 1;
        // Names inside a subquery belong to its own select list
        if list.ty(i) == Some(TokenType::ParenLeft)
            && (list.is_keyword(i + 1, "SELECT") || list.is_keyword(i + 1, "WITH"))
        {
            next = list.matching_paren(i).map_or(clause.end, |close| close + 1);
            continue;
        }
        if list.ty(i) != Some(TokenType::Word)
            || list.is_qualified(i)
            || matches!(list.ty(i + 1), Some(TokenType::ParenLeft | TokenType::Dot))
            || is_reserved(list.text(i))
        {
            continue;
        }
        // String literals have no identifier, so they never match
        let Some(name) = mask.span(list.text(i)).map_or_else(
            || Some(list.text(i).to_string()),
            |span| span.identifier(),
        ) else {
            continue;
        };
        match cx.lookup(&name) {
            Lookup::Missing => {}
            Lookup::Ambiguous => diagnostics.unsupported(
                codes::AMBIGUOUS_ALIAS,
                format!("HAVING {name} matches more than one select alias; left unchanged"),
                list.text(i),
            ),
            Lookup::Unique(index) => {
                if let Some(token) = list.get(i) {
                    edits.push(Replacement {
                        start: token.start,
                        end: token.end,
                        text: paren(&cx.aliases[index].expr),
                    });
                }
            }
        }
    }
}

/// The sort key of an `ORDER BY` item, minus `ASC`/`DESC`/`NULLS ...`.
fn sort_key_end(list: &TokenList<'_>, from: usize, to: usize, mask: &MaskedQuery) -> usize {
    let mut to = trim_comments(list, from, to, mask);
    if to >= from + 2
        && list.is_keyword(to - 2, "NULLS")
        && (list.is_keyword(to - 1, "FIRST") || list.is_keyword(to - 1, "LAST"))
    {
        to -= 2;
    }
    if to > from && (list.is_keyword(to - 1, "ASC") || list.is_keyword(to - 1, "DESC")) {
        to -= 1;
    }
    to
}

enum SortKey {
    /// A bare or qualified name
    Name(String),
    /// `CASE ... END` written for sort order only
    Case,
    Expression,
}

fn fix_order_by(
    list: &TokenList<'_>,
    clause: &ClauseRange,
    cx: &GroupingContext,
    mask: &MaskedQuery,
    edits: &mut Vec<Replacement>,
) {
    for (from, to) in list.split_commas(clause.body, clause.end, 0) {
        let key_end = sort_key_end(list, from, to, mask);
        if key_end <= from {
            continue;
        }
        let key_text = range_text(list, from, key_end);
        let key = if is_column_ref(list, from, key_end) {
            match mask.identifier(list.text(key_end - 1)) {
                Some(name) => SortKey::Name(name),
                None => continue,
            }
        } else if list.is_keyword(from, "CASE") {
            SortKey::Case
        } else {
            SortKey::Expression
        };
        let alias = match key {
            SortKey::Name(name) => cx.expanded_by_name(&name),
            // Only rewritten when the very same CASE was grouped through an
            //  alias; a CASE that just defines a custom order stays as is
            SortKey::Case | SortKey::Expression => {
                cx.expanded_by_expr(&normalize_expr(key_text, mask))
            }
        };
        let Some(alias) = alias else {
            continue;
        };
        let text = paren(&alias.expr);
        if text != key_text
            && let Some((start, end)) = token_range(list, from, key_end)
        {
            trace!(alias = %alias.name, "expanding ORDER BY to match GROUP BY");
            edits.push(Replacement { start, end, text });
        }
    }
}

/// Fixes the select starting at token [select] and ending before [end].
fn fix_select(
    list: &TokenList<'_>,
    select: usize,
    end: usize,
    fix_order: bool,
    mask: &MaskedQuery,
    diagnostics: &mut Diagnostics,
    edits: &mut Vec<Replacement>,
) {
    let clauses = clauses(list, select, end);
    let list_end = clauses.first().map(|c| c.start).unwrap_or(end);
    let find = |clause| clauses.iter().find(|c| c.clause == clause);

    let mut cx = collect_aliases(list, select + 1, list_end, mask);
    if cx.aliases.is_empty() {
        return;
    }
    if let Some(group_by) = find(Clause::GroupBy) {
        fix_group_by(list, group_by, &mut cx, mask, diagnostics, edits);
    }
    if let Some(having) = find(Clause::Having) {
        fix_having(list, having, &cx, mask, diagnostics, edits);
    }
    if fix_order
        && cx.expanded_count() > 0
        && let Some(order_by) = find(Clause::OrderBy)
    {
        fix_order_by(list, order_by, &cx, mask, edits);
    }
}

fn is_set_operator(list: &TokenList<'_>, index: usize) -> bool {
    ["UNION", "INTERSECT", "EXCEPT", "MINUS"]
        .iter()
        .any(|op| list.is_keyword(index, op))
}

fn fix_level(text: &str, mask: &MaskedQuery, diagnostics: &mut Diagnostics) -> Result<String> {
    // Subqueries first
    let text = {
        let list = TokenList::new(text)?;
        let mut edits = Vec::new();
        let mut i = 0;
        while i < list.len() {
            let subquery = list.ty(i) == Some(TokenType::ParenLeft)
                && (list.is_keyword(i + 1, "SELECT") || list.is_keyword(i + 1, "WITH"));
            if !subquery {
                i += 1;
                continue;
            }
            let close = list.matching_paren(i)?;
            if let (Some(open), Some(close_token)) = (list.get(i), list.get(close)) {
                let inner = &text[open.end..close_token.start];
                let fixed = fix_level(inner, mask, diagnostics)?;
                if fixed != inner {
                    edits.push(Replacement {
                        start: open.end,
                        end: close_token.start,
                        text: fixed,
                    });
                }
            }
            i = close + 1;
        }
        apply_edits(text, edits)
    };

    let list = TokenList::new(&text)?;
    let mut segments = Vec::new();
    let mut start = 0;
    let mut after_set_op = false;
    for i in 0..list.len() {
        if list.depth(i) != 0 {
            continue;
        }
        let set_op = is_set_operator(&list, i);
        if set_op || list.ty(i) == Some(TokenType::Semicolon) {
            segments.push((start, i, after_set_op));
            start = i + 1;
            after_set_op = set_op;
        }
    }
    segments.push((start, list.len(), after_set_op));

    let mut edits = Vec::new();
    for (from, to, after_set_op) in segments {
        let Some(select) = (from..to).find(|&i| list.depth(i) == 0 && list.is_keyword(i, "SELECT"))
        else {
            continue;
        };
        // ORDER BY after the last branch sorts the whole compound result,
        //  which only accepts output column names
        fix_select(&list, select, to, !after_set_op, mask, diagnostics, &mut edits);
    }
    Ok(apply_edits(&text, edits))
}

/// Runs the projection fixes over masked [text].
pub fn fix(text: &str, mask: &MaskedQuery, diagnostics: &mut Diagnostics) -> Result<String> {
    fix_level(text, mask, diagnostics)
}

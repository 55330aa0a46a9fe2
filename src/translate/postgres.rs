//! The MySQL to PostgreSQL rule table. Order matters: a rule sees the output
//!  of every rule above it, so `TIMESTAMPDIFF` and the date arithmetic rules
//!  run before the simple date functions they may contain, and the call
//!  rules for `DATE_ADD`/`DATE_SUB` run before the bare `INTERVAL` rule.

use super::{
    Call, ConversionRule, Matcher, Replacement, RuleContext, date_format::translate_format,
    find_keyword, range_text, replace_trimmed, wrap,
};
use crate::{
    config::SECONDS_PER_MONTH,
    diagnostics::codes,
    lex::{TokenList, TokenType},
    mask::quote_literal,
    mysql_functions::MysqlFunction as F,
};

macro_rules! call_rule {
    ($name:literal, [$($f:ident),+], $rewrite:ident) => {
        ConversionRule {
            name: $name,
            matcher: Matcher::Call(&[$(F::$f),+], $rewrite),
        }
    };
}

macro_rules! keyword_rule {
    ($name:literal, $keyword:literal, $rewrite:ident) => {
        ConversionRule {
            name: $name,
            matcher: Matcher::Keyword($keyword, $rewrite),
        }
    };
}

pub static RULES: &[ConversionRule] = &[
    call_rule!("timestampdiff", [TIMESTAMPDIFF], timestampdiff),
    call_rule!("datediff", [DATEDIFF], datediff),
    call_rule!("date-arithmetic", [DATE_ADD, DATE_SUB, ADDDATE, SUBDATE], date_arithmetic),
    keyword_rule!("interval", "INTERVAL", interval),
    call_rule!("date-format", [DATE_FORMAT], date_format),
    call_rule!("str-to-date", [STR_TO_DATE], str_to_date),
    call_rule!("monthname", [MONTHNAME], monthname),
    call_rule!("dayname", [DAYNAME], dayname),
    call_rule!(
        "date-parts",
        [YEAR, MONTH, DAY, DAYOFMONTH, HOUR, MINUTE, SECOND, QUARTER, DAYOFYEAR, WEEKDAY, DAYOFWEEK],
        date_part
    ),
    call_rule!("unix-timestamp", [UNIX_TIMESTAMP], unix_timestamp),
    call_rule!("from-unixtime", [FROM_UNIXTIME], from_unixtime),
    call_rule!("group-concat", [GROUP_CONCAT], group_concat),
    call_rule!("ifnull", [IFNULL], ifnull),
    call_rule!("if", [IF], if_),
    call_rule!("isnull", [ISNULL], isnull),
    call_rule!("cast", [CAST], cast),
    call_rule!("convert", [CONVERT], convert),
    call_rule!("locate", [LOCATE], locate),
    call_rule!("instr", [INSTR], instr),
    call_rule!("case-functions", [LCASE, UCASE], renamed),
    call_rule!("rand", [RAND], renamed),
    call_rule!("last-insert-id", [LAST_INSERT_ID], renamed),
    call_rule!(
        "current-time",
        [NOW, SYSDATE, CURDATE, CURTIME, CURRENT_DATE, CURRENT_TIMESTAMP, UTC_TIMESTAMP],
        current_time
    ),
    call_rule!("untranslatable", [FIELD, FIND_IN_SET, ELT, SUBSTRING_INDEX], untranslatable),
    keyword_rule!("limit", "LIMIT", limit),
    keyword_rule!("regexp", "REGEXP", regexp),
    keyword_rule!("rlike", "RLIKE", regexp),
    keyword_rule!("insert-ignore", "INSERT", insert_ignore),
    keyword_rule!("on-duplicate-key", "ON", on_duplicate_key),
    keyword_rule!("replace-into", "REPLACE", replace_into),
];

fn unsupported_call(call: &Call<'_>, cx: &mut RuleContext<'_>, why: &str) -> Option<String> {
    cx.diagnostics.unsupported(
        codes::UNSUPPORTED_FUNCTION,
        format!("{} {why}; review manually", call.function),
        call.source,
    );
    None
}

fn wrong_args(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    unsupported_call(
        call,
        cx,
        &format!("called with {} arguments", call.arg_count()),
    )
}

/// Strips the `SQL_TSI_` prefix ODBC-era code puts on units.
fn unit_name(word: &str) -> String {
    let upper = word.to_ascii_uppercase();
    match upper.strip_prefix("SQL_TSI_") {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

// TIMESTAMPDIFF(u, a, b) => epoch or date arithmetic on (b - a), per unit
fn timestampdiff(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 3 {
        return wrong_args(call, cx);
    }
    let (from, to) = (wrap(call.arg(1)), wrap(call.arg(2)));
    let epoch = format!("EXTRACT(EPOCH FROM ({to} - {from}))");
    let unit = unit_name(call.arg(0));
    Some(match unit.as_str() {
        "MICROSECOND" => format!("({epoch} * 1000000)"),
        "SECOND" => epoch,
        "MINUTE" => format!("({epoch} / 60)"),
        "HOUR" => format!("({epoch} / 3600)"),
        "DAY" => format!("({to}::DATE - {from}::DATE)"),
        "WEEK" => format!("(({to}::DATE - {from}::DATE) / 7)"),
        "MONTH" | "QUARTER" => {
            let seconds = if unit == "MONTH" {
                SECONDS_PER_MONTH
            } else {
                SECONDS_PER_MONTH * 3
            };
            cx.diagnostics.info(
                codes::LOSSY_MONTH_DIFF,
                format!(
                    "TIMESTAMPDIFF({unit}) uses an average month of {SECONDS_PER_MONTH} seconds"
                ),
                call.source,
            );
            format!("({epoch} / {seconds})")
        }
        "YEAR" => format!("EXTRACT(YEAR FROM AGE({to}, {from}))"),
        _ => {
            cx.diagnostics.unsupported(
                codes::UNKNOWN_UNIT,
                format!("unknown TIMESTAMPDIFF unit {}", call.arg(0)),
                call.source,
            );
            return None;
        }
    })
}

// DATEDIFF(a, b) => (a::DATE - b::DATE)
fn datediff(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 2 {
        return wrong_args(call, cx);
    }
    Some(format!(
        "({}::DATE - {}::DATE)",
        wrap(call.arg(0)),
        wrap(call.arg(1))
    ))
}

/// `(n || ' unit')::INTERVAL`, or None for units PostgreSQL can't take.
fn interval_expr(amount: &str, unit: &str, cx: &mut RuleContext<'_>) -> Option<String> {
    let (amount, unit) = match unit_name(unit).as_str() {
        "QUARTER" => (format!("{} * 3", wrap(amount)), "month"),
        u @ ("MICROSECOND" | "SECOND" | "MINUTE" | "HOUR" | "DAY" | "WEEK" | "MONTH"
        | "YEAR") => (wrap(amount), unit_str(u)),
        _ => return None,
    };
    let unit = cx.mask.push_literal(quote_literal(&format!(" {unit}")));
    Some(format!("({amount} || {unit})::INTERVAL"))
}

/// Compound MySQL units (`DAY_HOUR`, `MINUTE_SECOND`, ...) and typos of the
///  simple ones; anything else after `INTERVAL x` is not an interval at all.
fn looks_like_unit(word: &str) -> bool {
    let word = word.to_ascii_uppercase();
    ["SECOND", "MINUTE", "HOUR", "DAY", "WEEK", "MONTH", "QUARTER", "YEAR"]
        .iter()
        .any(|unit| word.contains(unit))
}

fn unit_str(unit: &str) -> &'static str {
    match unit {
        "MICROSECOND" => "microsecond",
        "SECOND" => "second",
        "MINUTE" => "minute",
        "HOUR" => "hour",
        "DAY" => "day",
        "WEEK" => "week",
        "MONTH" => "month",
        _ => "year",
    }
}

// DATE_ADD(x, INTERVAL n u) => (x + (n || ' u')::INTERVAL)
// DATE_SUB(x, INTERVAL n u) => (x - (n || ' u')::INTERVAL)
// ADDDATE(x, n) => (x + (n || ' day')::INTERVAL)
fn date_arithmetic(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 2 {
        return wrong_args(call, cx);
    }
    let op = match call.function {
        F::DATE_SUB | F::SUBDATE => '-',
        _ => '+',
    };
    let base = wrap(call.arg(0));
    let list = TokenList::new(call.arg(1)).ok()?;
    let interval = if list.is_keyword(0, "INTERVAL") && list.len() >= 3 {
        let unit_index = list.len() - 1;
        if list.ty(unit_index) != Some(TokenType::Word) {
            return unsupported_call(call, cx, "has an interval it can't parse");
        }
        let amount = range_text(&list, 1, unit_index);
        interval_expr(amount, list.text(unit_index), cx)
    } else {
        // A plain number of days
        interval_expr(call.arg(1), "DAY", cx)
    };
    match interval {
        Some(interval) => Some(format!("({base} {op} {interval})")),
        None => {
            cx.diagnostics.unsupported(
                codes::UNKNOWN_UNIT,
                format!("unsupported interval unit in {}", call.function),
                call.source,
            );
            None
        }
    }
}

// INTERVAL n UNIT => (n || ' unit')::INTERVAL
fn interval(list: &TokenList<'_>, index: usize, cx: &mut RuleContext<'_>) -> Option<Replacement> {
    let mut next = index + 1;
    // `INTERVAL '1 day'` and `INTERVAL '1' DAY` are already valid
    if let Some(span) = cx.mask.span(list.text(next))
        && span.is_string()
    {
        return None;
    }
    if list.ty(next) == Some(TokenType::Operator) && matches!(list.text(next), "-" | "+") {
        next += 1;
    }
    match list.ty(next)? {
        // INTERVAL(n, n1, ...) is a MySQL function, unless a unit follows
        TokenType::ParenLeft => next = list.matching_paren(next).ok()? + 1,
        TokenType::Number | TokenType::NumberedParam => next += 1,
        TokenType::Word => {
            next += 1;
            while list.ty(next) == Some(TokenType::Dot) && list.ty(next + 1) == Some(TokenType::Word)
            {
                next += 2;
            }
        }
        _ => return None,
    }
    if list.ty(next) != Some(TokenType::Word) {
        return None;
    }
    let amount = range_text(list, index + 1, next);
    let replacement = interval_expr(amount, list.text(next), cx);
    if replacement.is_none() && looks_like_unit(list.text(next)) {
        cx.diagnostics.unsupported(
            codes::UNKNOWN_UNIT,
            format!("unsupported interval unit {}", list.text(next)),
            list.slice(index, next),
        );
    }
    Some(Replacement {
        start: list.get(index)?.start,
        end: list.get(next)?.end,
        text: replacement?,
    })
}

/// The TO_CHAR pattern for a literal format argument, as a masked literal.
fn format_literal(call: &Call<'_>, arg: usize, cx: &mut RuleContext<'_>) -> Option<(String, bool)> {
    let Some(mysql) = cx.mask.string_value(call.arg(arg)) else {
        unsupported_call(call, cx, "has a format that isn't a string literal");
        return None;
    };
    let format = translate_format(&mysql);
    if !format.unknown.is_empty() {
        cx.diagnostics.unsupported(
            codes::DATE_FORMAT_TOKEN,
            format!(
                "format specifiers with no PostgreSQL equivalent: {}",
                format.unknown.join(", ")
            ),
            call.source,
        );
    }
    if !format.approximate.is_empty() {
        cx.diagnostics.info(
            codes::DATE_FORMAT_TOKEN,
            format!(
                "format specifiers translated approximately: {}",
                format.approximate.join(", ")
            ),
            call.source,
        );
    }
    let literal = cx.mask.push_literal(quote_literal(&format.pattern));
    Some((literal, format.has_time))
}

// DATE_FORMAT(x, fmt) => TO_CHAR(x, pg_fmt)
fn date_format(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 2 {
        return wrong_args(call, cx);
    }
    let (literal, _) = format_literal(call, 1, cx)?;
    Some(format!(
        "TO_CHAR({},{})",
        call.raw_arg(0),
        replace_trimmed(call.raw_arg(1), &literal)
    ))
}

// STR_TO_DATE(s, fmt) => TO_DATE(s, pg_fmt), TO_TIMESTAMP when fmt has a time
fn str_to_date(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 2 {
        return wrong_args(call, cx);
    }
    let (literal, has_time) = format_literal(call, 1, cx)?;
    let function = if has_time { "TO_TIMESTAMP" } else { "TO_DATE" };
    Some(format!(
        "{function}({},{})",
        call.raw_arg(0),
        replace_trimmed(call.raw_arg(1), &literal)
    ))
}

fn to_char_fixed(call: &Call<'_>, cx: &mut RuleContext<'_>, pattern: &str) -> Option<String> {
    if call.arg_count() != 1 {
        return wrong_args(call, cx);
    }
    let literal = cx.mask.push_literal(quote_literal(pattern));
    Some(format!("TO_CHAR({}, {literal})", call.arg(0)))
}

// MONTHNAME(x) => TO_CHAR(x, 'Month')
fn monthname(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    to_char_fixed(call, cx, "Month")
}

// DAYNAME(x) => TO_CHAR(x, 'Day')
fn dayname(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    to_char_fixed(call, cx, "Day")
}

// YEAR(x) => EXTRACT(YEAR FROM x), and friends
fn date_part(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 1 {
        return wrong_args(call, cx);
    }
    let x = call.arg(0);
    let field = match call.function {
        F::YEAR => "YEAR",
        F::MONTH => "MONTH",
        F::DAY | F::DAYOFMONTH => "DAY",
        F::HOUR => "HOUR",
        F::MINUTE => "MINUTE",
        F::SECOND => "SECOND",
        F::QUARTER => "QUARTER",
        F::DAYOFYEAR => "DOY",
        // MySQL: 1 = Sunday; PostgreSQL DOW: 0 = Sunday
        F::DAYOFWEEK => return Some(format!("(EXTRACT(DOW FROM {x}) + 1)")),
        // MySQL: 0 = Monday
        F::WEEKDAY => return Some(format!("((EXTRACT(DOW FROM {x}) + 6) % 7)")),
        _ => return None,
    };
    Some(format!("EXTRACT({field} FROM {x})"))
}

// UNIX_TIMESTAMP() => EXTRACT(EPOCH FROM CURRENT_TIMESTAMP)::BIGINT
// UNIX_TIMESTAMP(x) => EXTRACT(EPOCH FROM x)::BIGINT
fn unix_timestamp(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    match call.arg_count() {
        0 => Some("EXTRACT(EPOCH FROM CURRENT_TIMESTAMP)::BIGINT".to_string()),
        1 => Some(format!("EXTRACT(EPOCH FROM {})::BIGINT", call.arg(0))),
        _ => wrong_args(call, cx),
    }
}

// FROM_UNIXTIME(x) => TO_TIMESTAMP(x)
// FROM_UNIXTIME(x, fmt) => TO_CHAR(TO_TIMESTAMP(x), pg_fmt)
fn from_unixtime(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    match call.arg_count() {
        1 => Some(format!("TO_TIMESTAMP({})", call.inner())),
        2 => {
            let (literal, _) = format_literal(call, 1, cx)?;
            Some(format!("TO_CHAR(TO_TIMESTAMP({}), {literal})", call.arg(0)))
        }
        _ => wrong_args(call, cx),
    }
}

// GROUP_CONCAT([DISTINCT] e [ORDER BY o] [SEPARATOR s])
//   => STRING_AGG([DISTINCT] e, s [ORDER BY o])
fn group_concat(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    let unsafe_argument = |cx: &mut RuleContext<'_>, why: &str| {
        cx.diagnostics.unsupported(
            codes::UNSAFE_ARGUMENT,
            format!("could not safely rewrite GROUP_CONCAT argument ({why}); review manually"),
            call.source,
        );
        None
    };

    let list = TokenList::new(call.inner()).ok()?;
    let end = list.len();
    let distinct = list.is_keyword(0, "DISTINCT");
    let expr_start = usize::from(distinct);
    let separator = find_keyword(&list, "SEPARATOR", expr_start, end, 0);
    let order = (expr_start..separator.unwrap_or(end))
        .find(|&i| list.depth(i) == 0 && list.keywords_at(i, &["ORDER", "BY"]).is_some());
    let expr_end = order.or(separator).unwrap_or(end);

    let separator = match separator {
        Some(at) => {
            if at + 2 != end {
                return unsafe_argument(cx, "separator is not a single literal");
            }
            match cx.mask.as_pg_string(list.text(at + 1)) {
                Some(literal) => literal,
                None => return unsafe_argument(cx, "separator is not a string literal"),
            }
        }
        None => cx.mask.push_literal(quote_literal(",")),
    };

    let exprs: Vec<&str> = list
        .split_commas(expr_start, expr_end, 0)
        .into_iter()
        .map(|(from, to)| range_text(&list, from, to))
        .collect();
    if exprs.iter().any(|e| e.is_empty()) {
        return unsafe_argument(cx, "empty expression");
    }
    let order_by = order.map(|at| range_text(&list, at + 2, separator_index(&list, at, end)));
    if order_by.is_some_and(str::is_empty) {
        return unsafe_argument(cx, "empty ORDER BY");
    }

    let expr = if exprs.len() > 1 {
        format!("CONCAT({})", exprs.join(", "))
    } else if distinct && order_by.is_some() {
        // With DISTINCT, PostgreSQL wants the ORDER BY keys verbatim in the
        //  argument, so no cast
        exprs[0].to_string()
    } else {
        format!("{}::TEXT", wrap(exprs[0]))
    };

    let mut res = String::from("STRING_AGG(");
    if distinct {
        res.push_str("DISTINCT ");
    }
    res.push_str(&expr);
    res.push_str(", ");
    res.push_str(&separator);
    if let Some(order_by) = order_by {
        res.push_str(" ORDER BY ");
        res.push_str(order_by);
    }
    res.push(')');
    Some(res)
}

fn separator_index(list: &TokenList<'_>, from: usize, end: usize) -> usize {
    find_keyword(list, "SEPARATOR", from, end, 0).unwrap_or(end)
}

// IFNULL(a, b) => COALESCE(a, b)
fn ifnull(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 2 {
        return wrong_args(call, cx);
    }
    Some(format!("COALESCE({})", call.inner()))
}

// IF(c, a, b) => CASE WHEN c THEN a ELSE b END
fn if_(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 3 {
        return wrong_args(call, cx);
    }
    Some(format!(
        "CASE WHEN {} THEN {} ELSE {} END",
        call.arg(0),
        call.arg(1),
        call.arg(2)
    ))
}

// ISNULL(x) => (x IS NULL)
fn isnull(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 1 {
        return wrong_args(call, cx);
    }
    Some(format!("({} IS NULL)", wrap(call.arg(0))))
}

/// PostgreSQL spelling of a MySQL cast target, None if it needs no change.
fn pg_type(mysql: &str) -> Option<String> {
    let words: Vec<String> = mysql
        .split_whitespace()
        .map(|w| w.to_ascii_uppercase())
        .collect();
    let normalized = words.join(" ");
    let (base, size) = match normalized.find('(') {
        Some(at) => (normalized[..at].trim(), Some(&normalized[at..])),
        None => (normalized.as_str(), None),
    };
    let pg = match (base, size) {
        ("CHAR" | "NCHAR", None) => "TEXT".to_string(),
        ("CHAR" | "NCHAR", Some(size)) => format!("VARCHAR{size}"),
        (
            "SIGNED" | "SIGNED INTEGER" | "SIGNED INT" | "UNSIGNED" | "UNSIGNED INTEGER"
            | "UNSIGNED INT",
            None,
        ) => "BIGINT".to_string(),
        ("DATETIME", size) => format!("TIMESTAMP{}", size.unwrap_or("")),
        ("BINARY", None) => "BYTEA".to_string(),
        ("DOUBLE", None) => "DOUBLE PRECISION".to_string(),
        _ => return None,
    };
    Some(pg)
}

/// Type names PostgreSQL accepts as written in a MySQL cast.
const PORTABLE_TYPES: &[&str] = &[
    "BIGINT", "BOOL", "BOOLEAN", "BYTEA", "CHARACTER", "DATE", "DEC", "DECIMAL", "DOUBLE",
    "FLOAT", "INT", "INTEGER", "INTERVAL", "JSON", "JSONB", "NUMERIC", "REAL", "SMALLINT", "TEXT",
    "TIME", "TIMESTAMP", "TIMESTAMPTZ", "UUID", "VARCHAR",
];

/// Drops a `CHARACTER SET cs` / `CHARSET cs` suffix from a cast target.
fn strip_charset(ty: &str) -> Option<String> {
    let list = TokenList::new(ty).ok()?;
    let (at, name) = (0..list.len()).find_map(|i| {
        list.keywords_at(i, &["CHARACTER", "SET"])
            .or_else(|| list.keywords_at(i, &["CHARSET"]))
            .map(|name| (i, name))
    })?;
    let from = list.get(at)?.start;
    let to = list.get(name).map_or(ty.len(), |t| t.end);
    Some(format!("{}{}", ty[..from].trim_end(), &ty[to..]))
}

/// The PostgreSQL cast target for [ty], None when it stays as written.
fn cast_target(ty: &str, source: &str, cx: &mut RuleContext<'_>) -> Option<String> {
    let stripped = strip_charset(ty);
    if stripped.is_some() {
        cx.diagnostics.info(
            codes::CHARSET_DROPPED,
            "character set dropped from cast; PostgreSQL strings carry the database encoding",
            source,
        );
    }
    let ty = stripped.as_deref().unwrap_or(ty).trim();
    if let Some(pg) = pg_type(ty) {
        return Some(pg);
    }
    let base = ty
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    if !PORTABLE_TYPES.iter().any(|p| p.eq_ignore_ascii_case(base)) {
        cx.diagnostics.unsupported(
            codes::UNSUPPORTED_SYNTAX,
            format!("cast to {ty} has no PostgreSQL equivalent; left unchanged"),
            source,
        );
    }
    stripped.map(|ty| ty.trim().to_string())
}

// CAST(x AS CHAR) => CAST(x AS TEXT), and the other type names
fn cast(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    let list = TokenList::new(call.inner()).ok()?;
    let at = (0..list.len())
        .rev()
        .find(|&i| list.depth(i) == 0 && list.is_keyword(i, "AS"))?;
    let type_start = list.get(at + 1)?.start;
    let new_type = cast_target(&call.inner()[type_start..], call.source, cx)?;
    Some(format!("CAST({}{new_type})", &call.inner()[..type_start]))
}

// CONVERT(x USING cs) => x
// CONVERT(x, type) => CAST(x AS type)
fn convert(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    let list = TokenList::new(call.inner()).ok()?;
    if let Some(at) = find_keyword(&list, "USING", 0, list.len(), 0) {
        cx.diagnostics.info(
            codes::CHARSET_DROPPED,
            "CONVERT ... USING dropped; PostgreSQL strings carry the database encoding",
            call.source,
        );
        return Some(wrap(range_text(&list, 0, at)));
    }
    if call.arg_count() != 2 {
        return wrong_args(call, cx);
    }
    let ty = call.arg(1);
    let ty = cast_target(ty, call.source, cx).unwrap_or_else(|| ty.trim().to_string());
    Some(format!("CAST({} AS {ty})", call.arg(0)))
}

// LOCATE(needle, hay) => POSITION(needle IN hay)
fn locate(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    match call.arg_count() {
        2 => Some(position(call.arg(0), call.arg(1))),
        3 => unsupported_call(call, cx, "with a start position has no POSITION equivalent"),
        _ => wrong_args(call, cx),
    }
}

// INSTR(hay, needle) => POSITION(needle IN hay)
fn instr(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    if call.arg_count() != 2 {
        return wrong_args(call, cx);
    }
    Some(position(call.arg(1), call.arg(0)))
}

fn position(needle: &str, hay: &str) -> String {
    format!("POSITION({} IN {})", wrap(needle), wrap(hay))
}

// LCASE(x) => LOWER(x)
// UCASE(x) => UPPER(x)
// RAND() => RANDOM()
// LAST_INSERT_ID() => LASTVAL()
fn renamed(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    let name = match call.function {
        F::LCASE => "LOWER",
        F::UCASE => "UPPER",
        F::RAND if call.arg_count() == 0 => "RANDOM",
        F::LAST_INSERT_ID if call.arg_count() == 0 => "LASTVAL",
        _ => return unsupported_call(call, cx, "with arguments has no equivalent"),
    };
    Some(format!("{name}({})", call.inner()))
}

// NOW() => CURRENT_TIMESTAMP, CURDATE() => CURRENT_DATE, ...
fn current_time(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    let precision = match call.arg_count() {
        0 => String::new(),
        1 => format!("({})", call.arg(0)),
        _ => return wrong_args(call, cx),
    };
    Some(match call.function {
        F::CURDATE | F::CURRENT_DATE => "CURRENT_DATE".to_string(),
        F::CURTIME => format!("CURRENT_TIME{precision}"),
        F::UTC_TIMESTAMP => {
            let utc = cx.mask.push_literal(quote_literal("UTC"));
            format!("(CURRENT_TIMESTAMP{precision} AT TIME ZONE {utc})")
        }
        _ => format!("CURRENT_TIMESTAMP{precision}"),
    })
}

fn untranslatable(call: &Call<'_>, cx: &mut RuleContext<'_>) -> Option<String> {
    unsupported_call(call, cx, "has no PostgreSQL equivalent")
}

/// A LIMIT operand: a number or a placeholder tag.
fn is_limit_operand(list: &TokenList<'_>, index: usize) -> bool {
    match list.ty(index) {
        Some(TokenType::Number | TokenType::NumberedParam) => true,
        Some(TokenType::Word) => list.text(index).starts_with(crate::placeholders::TAG_PREFIX),
        _ => false,
    }
}

// LIMIT a, b => LIMIT b OFFSET a
fn limit(list: &TokenList<'_>, index: usize, _cx: &mut RuleContext<'_>) -> Option<Replacement> {
    let (offset, count) = (index + 1, index + 3);
    if !is_limit_operand(list, offset)
        || list.ty(index + 2) != Some(TokenType::Comma)
        || !is_limit_operand(list, count)
    {
        return None;
    }
    Some(Replacement {
        start: list.get(index)?.start,
        end: list.get(count)?.end,
        text: format!(
            "{} {} OFFSET {}",
            list.text(index),
            list.text(count),
            list.text(offset)
        ),
    })
}

// x REGEXP p => x ~* p
// x NOT REGEXP p => x !~* p
fn regexp(list: &TokenList<'_>, index: usize, _cx: &mut RuleContext<'_>) -> Option<Replacement> {
    let end = list.get(index)?.end;
    if index > 0 && list.is_keyword(index - 1, "NOT") {
        return Some(Replacement {
            start: list.get(index - 1)?.start,
            end,
            text: "!~*".to_string(),
        });
    }
    Some(Replacement {
        start: list.get(index)?.start,
        end,
        text: "~*".to_string(),
    })
}

/// Last token of the statement starting at [index], trailing comments
///  excluded.
fn statement_end(list: &TokenList<'_>, index: usize, cx: &RuleContext<'_>) -> usize {
    let depth = list.depth(index);
    let mut end = (index..list.len())
        .find(|&i| list.ty(i) == Some(TokenType::Semicolon) && list.depth(i) == depth)
        .unwrap_or(list.len());
    while end > index + 1 && cx.mask.is_comment(list.text(end - 1)) {
        end -= 1;
    }
    end - 1
}

// INSERT IGNORE INTO ... => INSERT INTO ... ON CONFLICT DO NOTHING
fn insert_ignore(list: &TokenList<'_>, index: usize, cx: &mut RuleContext<'_>) -> Option<Replacement> {
    if !list.is_keyword(index + 1, "IGNORE") {
        return None;
    }
    let last = statement_end(list, index, cx);
    if (index..=last).any(|i| list.keywords_at(i, &["ON", "DUPLICATE", "KEY"]).is_some()) {
        return None;
    }
    let rest = list.get(index + 2)?.start;
    let end = list.get(last)?.end;
    Some(Replacement {
        start: list.get(index + 1)?.start,
        end,
        text: format!("{} ON CONFLICT DO NOTHING", &list.source()[rest..end]),
    })
}

fn on_duplicate_key(list: &TokenList<'_>, index: usize, cx: &mut RuleContext<'_>) -> Option<Replacement> {
    if list.keywords_at(index, &["ON", "DUPLICATE", "KEY", "UPDATE"]).is_some() {
        cx.diagnostics.unsupported(
            codes::UNSUPPORTED_SYNTAX,
            "ON DUPLICATE KEY UPDATE needs an explicit ON CONFLICT target; review manually",
            list.slice(index, index + 3),
        );
    }
    None
}

fn replace_into(list: &TokenList<'_>, index: usize, cx: &mut RuleContext<'_>) -> Option<Replacement> {
    if list.is_keyword(index + 1, "INTO") {
        cx.diagnostics.unsupported(
            codes::UNSUPPORTED_SYNTAX,
            "REPLACE INTO has no PostgreSQL equivalent; review manually",
            list.slice(index, index + 1),
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{ConversionWarning, Diagnostics, Severity},
        mask::mask,
        translate::apply,
    };
    use pretty_assertions::assert_eq;

    fn run(sql: &str) -> (String, Vec<ConversionWarning>) {
        let mut masked = mask(sql).unwrap();
        let mut diagnostics = Diagnostics::new();
        let text = masked.text.clone();
        let mut cx = RuleContext {
            mask: &mut masked,
            diagnostics: &mut diagnostics,
        };
        let out = apply(text, RULES, &mut cx).unwrap();
        (masked.unmask(&out), diagnostics.into_vec())
    }

    fn convert(sql: &str) -> String {
        run(sql).0
    }

    #[test]
    fn timestampdiff_units() {
        assert_eq!(
            convert("TIMESTAMPDIFF(YEAR, birth, NOW())"),
            "EXTRACT(YEAR FROM AGE(CURRENT_TIMESTAMP, birth))"
        );
        assert_eq!(
            convert("TIMESTAMPDIFF(DAY, a.start, a.end)"),
            "(a.end::DATE - a.start::DATE)"
        );
        assert_eq!(
            convert("TIMESTAMPDIFF(HOUR, a, b + 1)"),
            "(EXTRACT(EPOCH FROM ((b + 1) - a)) / 3600)"
        );

        let (out, warnings) = run("TIMESTAMPDIFF(MONTH, x, COALESCE(y, NOW()))");
        assert_eq!(
            out,
            "(EXTRACT(EPOCH FROM (COALESCE(y, CURRENT_TIMESTAMP) - x)) / 2629746)"
        );
        assert_eq!(warnings[0].code, codes::LOSSY_MONTH_DIFF);
        assert_eq!(warnings[0].severity, Severity::Info);
    }

    #[test]
    fn timestampdiff_unknown_unit() {
        let (out, warnings) = run("TIMESTAMPDIFF(FORTNIGHT, a, b)");
        assert_eq!(out, "TIMESTAMPDIFF(FORTNIGHT, a, b)");
        assert_eq!(warnings[0].code, codes::UNKNOWN_UNIT);
        assert_eq!(warnings[0].severity, Severity::Unsupported);
    }

    #[test]
    fn date_arithmetic() {
        assert_eq!(
            convert("DATE_SUB(NOW(), INTERVAL 30 DAY)"),
            "(CURRENT_TIMESTAMP - (30 || ' day')::INTERVAL)"
        );
        assert_eq!(
            convert("DATE_ADD(created, INTERVAL __PARAM_0__ MONTH)"),
            "(created + (__PARAM_0__ || ' month')::INTERVAL)"
        );
        assert_eq!(
            convert("DATE_ADD(d, INTERVAL 1 QUARTER)"),
            "(d + (1 * 3 || ' month')::INTERVAL)"
        );
        assert_eq!(convert("ADDDATE(d, 7)"), "(d + (7 || ' day')::INTERVAL)");
        assert_eq!(
            convert("DATEDIFF(NOW(), last_login)"),
            "(CURRENT_TIMESTAMP::DATE - last_login::DATE)"
        );
    }

    #[test]
    fn bare_interval() {
        assert_eq!(
            convert("WHERE d > NOW() - INTERVAL 7 DAY"),
            "WHERE d > CURRENT_TIMESTAMP - (7 || ' day')::INTERVAL"
        );
        assert_eq!(
            convert("WHERE d > NOW() - INTERVAL '7 days'"),
            "WHERE d > CURRENT_TIMESTAMP - INTERVAL '7 days'"
        );
        let (out, warnings) = run("d + INTERVAL 1 DAY_HOUR");
        assert_eq!(out, "d + INTERVAL 1 DAY_HOUR");
        assert_eq!(warnings[0].code, codes::UNKNOWN_UNIT);

        let (out, warnings) = run("SELECT interval FROM t");
        assert_eq!(out, "SELECT interval FROM t");
        assert!(warnings.is_empty());
    }

    #[test]
    fn date_formats() {
        assert_eq!(convert("DATE_FORMAT(d,'%Y-%m')"), "TO_CHAR(d,'YYYY-MM')");
        assert_eq!(
            convert("DATE_FORMAT(created_at, \"%d/%m/%Y\")"),
            "TO_CHAR(created_at, 'DD/MM/YYYY')"
        );
        assert_eq!(
            convert("STR_TO_DATE(s, '%Y-%m-%d')"),
            "TO_DATE(s, 'YYYY-MM-DD')"
        );
        assert_eq!(
            convert("STR_TO_DATE(s, '%Y-%m-%d %H:%i')"),
            "TO_TIMESTAMP(s, 'YYYY-MM-DD HH24:MI')"
        );
        assert_eq!(convert("MONTHNAME(d)"), "TO_CHAR(d, 'Month')");

        let (out, warnings) = run("DATE_FORMAT(d, fmt_col)");
        assert_eq!(out, "DATE_FORMAT(d, fmt_col)");
        assert_eq!(warnings[0].severity, Severity::Unsupported);
    }

    #[test]
    fn date_parts() {
        assert_eq!(convert("YEAR(d)"), "EXTRACT(YEAR FROM d)");
        assert_eq!(convert("DAYOFMONTH(t.d)"), "EXTRACT(DAY FROM t.d)");
        assert_eq!(convert("DAYOFWEEK(d)"), "(EXTRACT(DOW FROM d) + 1)");
        assert_eq!(convert("WEEKDAY(d)"), "((EXTRACT(DOW FROM d) + 6) % 7)");
        assert_eq!(
            convert("MONTH(DATE_ADD(d, INTERVAL 1 MONTH))"),
            "EXTRACT(MONTH FROM (d + (1 || ' month')::INTERVAL))"
        );
        assert_eq!(
            convert("UNIX_TIMESTAMP()"),
            "EXTRACT(EPOCH FROM CURRENT_TIMESTAMP)::BIGINT"
        );
        assert_eq!(convert("FROM_UNIXTIME(ts)"), "TO_TIMESTAMP(ts)");
    }

    #[test]
    fn group_concat() {
        assert_eq!(
            convert("GROUP_CONCAT(name SEPARATOR ', ')"),
            "STRING_AGG(name::TEXT, ', ')"
        );
        assert_eq!(convert("GROUP_CONCAT(id)"), "STRING_AGG(id::TEXT, ',')");
        assert_eq!(
            convert("GROUP_CONCAT(DISTINCT tag ORDER BY tag SEPARATOR '|')"),
            "STRING_AGG(DISTINCT tag, '|' ORDER BY tag)"
        );
        assert_eq!(
            convert("GROUP_CONCAT(first, ' ', last ORDER BY last DESC)"),
            "STRING_AGG(CONCAT(first, ' ', last), ',' ORDER BY last DESC)"
        );
        assert_eq!(
            convert("GROUP_CONCAT(\n  IF(a > 0, CONCAT(b, '(', c, ')'), d)\n  SEPARATOR '; ')"),
            "STRING_AGG(CASE WHEN a > 0 THEN CONCAT(b, '(', c, ')') ELSE d END::TEXT, '; ')"
        );

        let (out, warnings) = run("GROUP_CONCAT(x SEPARATOR sep_col)");
        assert_eq!(out, "GROUP_CONCAT(x SEPARATOR sep_col)");
        assert_eq!(warnings[0].code, codes::UNSAFE_ARGUMENT);
        assert!(warnings[0].message.starts_with("could not safely rewrite GROUP_CONCAT argument"));
    }

    #[test]
    fn conditionals() {
        assert_eq!(convert("IFNULL(a, 0)"), "COALESCE(a, 0)");
        assert_eq!(
            convert("IF(x > 1, 'big', IF(x = 1, 'one', 'small'))"),
            "CASE WHEN x > 1 THEN 'big' ELSE CASE WHEN x = 1 THEN 'one' ELSE 'small' END END"
        );
        assert_eq!(convert("ISNULL(a.b)"), "(a.b IS NULL)");
        assert_eq!(convert("NULLIF(x, 0)"), "NULLIF(x, 0)");
    }

    #[test]
    fn casts() {
        assert_eq!(convert("CAST(x AS CHAR)"), "CAST(x AS TEXT)");
        assert_eq!(convert("CAST(x AS char(10))"), "CAST(x AS VARCHAR(10))");
        assert_eq!(convert("CAST(x AS UNSIGNED INTEGER)"), "CAST(x AS BIGINT)");
        assert_eq!(convert("CAST(x AS DECIMAL(10, 2))"), "CAST(x AS DECIMAL(10, 2))");
        assert_eq!(convert("CONVERT(x, SIGNED)"), "CAST(x AS BIGINT)");

        let (out, warnings) = run("CONVERT(name USING utf8mb4)");
        assert_eq!(out, "name");
        assert_eq!(warnings[0].code, codes::CHARSET_DROPPED);
    }

    #[test]
    fn cast_targets_with_charsets() {
        let (out, warnings) = run("CAST(x AS CHAR CHARACTER SET utf8mb4)");
        assert_eq!(out, "CAST(x AS TEXT)");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, codes::CHARSET_DROPPED);

        let (out, warnings) = run("CONVERT(x, CHAR(20) CHARSET latin1)");
        assert_eq!(out, "CAST(x AS VARCHAR(20))");
        assert_eq!(warnings[0].code, codes::CHARSET_DROPPED);

        let (out, warnings) = run("CAST(y AS YEAR)");
        assert_eq!(out, "CAST(y AS YEAR)");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, codes::UNSUPPORTED_SYNTAX);
        assert_eq!(warnings[0].severity, Severity::Unsupported);

        let (_, warnings) =
            run("CAST(x AS DECIMAL(10, 2)) + CAST(d AS DATE) + CONVERT(f, DOUBLE)");
        assert!(warnings.is_empty());
    }

    #[test]
    fn string_functions() {
        assert_eq!(convert("LOCATE('@', email)"), "POSITION('@' IN email)");
        assert_eq!(convert("INSTR(a || b, 'x')"), "POSITION('x' IN (a || b))");
        assert_eq!(convert("LCASE(name)"), "LOWER(name)");
        assert_eq!(convert("RAND()"), "RANDOM()");
        assert_eq!(convert("LAST_INSERT_ID()"), "LASTVAL()");

        let (out, warnings) = run("LOCATE('a', s, 3)");
        assert_eq!(out, "LOCATE('a', s, 3)");
        assert_eq!(warnings.len(), 1);

        let (_, warnings) = run("FIND_IN_SET(x, list)");
        assert_eq!(warnings[0].severity, Severity::Unsupported);
    }

    #[test]
    fn current_time() {
        assert_eq!(convert("NOW()"), "CURRENT_TIMESTAMP");
        assert_eq!(convert("now(3)"), "CURRENT_TIMESTAMP(3)");
        assert_eq!(convert("CURDATE()"), "CURRENT_DATE");
        assert_eq!(convert("SYSDATE()"), "CURRENT_TIMESTAMP");
        assert_eq!(convert("CURTIME()"), "CURRENT_TIME");
        assert_eq!(
            convert("UTC_TIMESTAMP()"),
            "(CURRENT_TIMESTAMP AT TIME ZONE 'UTC')"
        );
        assert_eq!(convert("CURRENT_DATE"), "CURRENT_DATE");
    }

    #[test]
    fn keywords() {
        assert_eq!(
            convert("SELECT * FROM t LIMIT 10, 20"),
            "SELECT * FROM t LIMIT 20 OFFSET 10"
        );
        assert_eq!(
            convert("SELECT * FROM t LIMIT 20 OFFSET 10"),
            "SELECT * FROM t LIMIT 20 OFFSET 10"
        );
        assert_eq!(convert("WHERE a REGEXP '^x'"), "WHERE a ~* '^x'");
        assert_eq!(convert("WHERE a not rlike '^x'"), "WHERE a !~* '^x'");
        assert_eq!(
            convert("INSERT IGNORE INTO t (a) VALUES (1); -- done"),
            "INSERT INTO t (a) VALUES (1) ON CONFLICT DO NOTHING; -- done"
        );
        assert_eq!(
            convert("INSERT IGNORE INTO t (a) VALUES (1) /* trailing */"),
            "INSERT INTO t (a) VALUES (1) ON CONFLICT DO NOTHING /* trailing */"
        );

        let (out, warnings) = run("INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = 2");
        assert_eq!(out, "INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = 2");
        assert_eq!(warnings[0].code, codes::UNSUPPORTED_SYNTAX);
    }

    #[test]
    fn literals_are_opaque() {
        let sql = "WHERE name = 'TIMESTAMPDIFF(MONTH,a,b)' -- NOW()";
        let (out, warnings) = run(sql);
        assert_eq!(out, sql);
        assert!(warnings.is_empty());
    }
}

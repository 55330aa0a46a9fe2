#![no_main]
use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;

/// Pieces of MySQL the rules know about; gluing them together reaches the
///  rewrite paths far more often than random text does.
#[derive(Debug, Arbitrary)]
enum Fragment {
    Column(u8),
    Placeholder,
    Number(i16),
    Str(String),
    Backtick(String),
    Comment(String),
    Call(Function, Vec<Fragment>),
    Interval(Box<Fragment>, Unit),
    GroupConcat(bool, Box<Fragment>, Option<String>),
    Compare(Box<Fragment>, Op, Box<Fragment>),
    Collate(Box<Fragment>, Collation),
    Subquery(Box<Select>),
}

#[derive(Debug, Arbitrary)]
enum Function {
    DateFormat,
    DateAdd,
    DateSub,
    Timestampdiff,
    Ifnull,
    If,
    Now,
    Year,
    Locate,
    Nullif,
    Concat,
    Count,
    FindInSet,
}

#[derive(Debug, Arbitrary)]
enum Unit {
    Second,
    Day,
    Month,
    Quarter,
    Year,
    Fortnight,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Eq,
    Ne,
    Lt,
    Regexp,
}

#[derive(Debug, Arbitrary)]
enum Collation {
    Unicode,
    Bin,
    C,
}

#[derive(Debug, Arbitrary)]
struct Item {
    expr: Fragment,
    alias: Option<u8>,
}

#[derive(Debug, Arbitrary)]
struct Select {
    items: Vec<Item>,
    filter: Option<Fragment>,
    group_by: Vec<Fragment>,
    group_by_alias: Option<u8>,
    rollup: bool,
    having: Option<Fragment>,
    order_by: Vec<Fragment>,
    order_by_alias: Option<u8>,
    limit: Option<(Option<u8>, u8)>,
}

fn clean(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric() || *c == ' ').take(40).collect()
}

impl Fragment {
    fn write(&self, out: &mut String) {
        match self {
            Fragment::Column(n) => out.push_str(&format!("c{}", n % 8)),
            Fragment::Placeholder => out.push('?'),
            Fragment::Number(n) => out.push_str(&n.to_string()),
            Fragment::Str(s) => out.push_str(&format!("'{}'", s.replace('\\', "").replace('\'', "''"))),
            Fragment::Backtick(s) => out.push_str(&format!("`{}`", clean(s))),
            Fragment::Comment(s) => out.push_str(&format!("/* {} */ 0", clean(s))),
            Fragment::Call(function, args) => {
                let name = match function {
                    Function::DateFormat => "DATE_FORMAT",
                    Function::DateAdd => "DATE_ADD",
                    Function::DateSub => "DATE_SUB",
                    Function::Timestampdiff => "TIMESTAMPDIFF",
                    Function::Ifnull => "IFNULL",
                    Function::If => "IF",
                    Function::Now => "NOW",
                    Function::Year => "YEAR",
                    Function::Locate => "LOCATE",
                    Function::Nullif => "NULLIF",
                    Function::Concat => "CONCAT",
                    Function::Count => "COUNT",
                    Function::FindInSet => "FIND_IN_SET",
                };
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().take(4).enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    arg.write(out);
                }
                out.push(')');
            }
            Fragment::Interval(amount, unit) => {
                out.push_str("INTERVAL ");
                amount.write(out);
                out.push_str(match unit {
                    Unit::Second => " SECOND",
                    Unit::Day => " DAY",
                    Unit::Month => " MONTH",
                    Unit::Quarter => " QUARTER",
                    Unit::Year => " YEAR",
                    Unit::Fortnight => " FORTNIGHT",
                });
            }
            Fragment::GroupConcat(distinct, expr, separator) => {
                out.push_str("GROUP_CONCAT(");
                if *distinct {
                    out.push_str("DISTINCT ");
                }
                expr.write(out);
                if let Some(separator) = separator {
                    out.push_str(&format!(" SEPARATOR '{}'", clean(separator)));
                }
                out.push(')');
            }
            Fragment::Compare(left, op, right) => {
                left.write(out);
                out.push_str(match op {
                    Op::Eq => " = ",
                    Op::Ne => " <> ",
                    Op::Lt => " < ",
                    Op::Regexp => " REGEXP ",
                });
                right.write(out);
            }
            Fragment::Collate(expr, collation) => {
                expr.write(out);
                out.push_str(match collation {
                    Collation::Unicode => " COLLATE utf8mb4_unicode_ci",
                    Collation::Bin => " COLLATE utf8mb4_bin",
                    Collation::C => " COLLATE \"C\"",
                });
            }
            Fragment::Subquery(select) => {
                out.push('(');
                select.write(out);
                out.push(')');
            }
        }
    }
}

impl Select {
    fn write(&self, out: &mut String) {
        out.push_str("SELECT ");
        if self.items.is_empty() {
            out.push('*');
        }
        for (i, item) in self.items.iter().take(6).enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            item.expr.write(out);
            if let Some(alias) = item.alias {
                out.push_str(&format!(" AS a{}", alias % 4));
            }
        }
        out.push_str(" FROM t");
        if let Some(filter) = &self.filter {
            out.push_str(" WHERE ");
            filter.write(out);
        }
        let mut group_by: Vec<String> = self.group_by.iter().take(3).map(to_string).collect();
        if let Some(alias) = self.group_by_alias {
            group_by.push(format!("a{}", alias % 4));
        }
        if !group_by.is_empty() {
            out.push_str(" GROUP BY ");
            out.push_str(&group_by.join(", "));
            if self.rollup {
                out.push_str(" WITH ROLLUP");
            }
        }
        if let Some(having) = &self.having {
            out.push_str(" HAVING ");
            having.write(out);
        }
        let mut order_by: Vec<String> = self.order_by.iter().take(3).map(to_string).collect();
        if let Some(alias) = self.order_by_alias {
            order_by.push(format!("a{} DESC", alias % 4));
        }
        if !order_by.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_str(&order_by.join(", "));
        }
        match self.limit {
            Some((Some(offset), count)) => out.push_str(&format!(" LIMIT {offset}, {count}")),
            Some((None, count)) => out.push_str(&format!(" LIMIT {count}")),
            None => {}
        }
    }
}

fn to_string(fragment: &Fragment) -> String {
    let mut out = String::new();
    fragment.write(&mut out);
    out
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    if let Ok(select) = Select::arbitrary(&mut u) {
        let mut sql = String::new();
        select.write(&mut sql);
        let params: Vec<u32> = (0..sql.matches('?').count() as u32).collect();
        mysql_pg::fuzz_helper::convert_with_params(&sql, &params);
    }
});

/// MySQL functions the rule table knows how to handle (or knows it can't).
///  Names match the SQL spelling so `Display` gives the call name back.
#[allow(non_camel_case_types)]
#[derive(
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[strum(ascii_case_insensitive)]
pub enum MysqlFunction {
    ADDDATE,
    CAST,
    CONVERT,
    CURDATE,
    CURRENT_DATE,
    CURRENT_TIMESTAMP,
    CURTIME,
    DATEDIFF,
    DATE_ADD,
    DATE_FORMAT,
    DATE_SUB,
    DAY,
    DAYNAME,
    DAYOFMONTH,
    DAYOFWEEK,
    DAYOFYEAR,
    ELT,
    FIELD,
    FIND_IN_SET,
    FROM_UNIXTIME,
    GROUP_CONCAT,
    HOUR,
    IF,
    IFNULL,
    INSTR,
    ISNULL,
    LAST_INSERT_ID,
    LCASE,
    LOCATE,
    MINUTE,
    MONTH,
    MONTHNAME,
    NOW,
    QUARTER,
    RAND,
    SECOND,
    STR_TO_DATE,
    SUBDATE,
    SUBSTRING_INDEX,
    SYSDATE,
    TIMESTAMPDIFF,
    UCASE,
    UNIX_TIMESTAMP,
    UTC_TIMESTAMP,
    WEEKDAY,
    YEAR,
}

impl MysqlFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Functions spelled and behaving the same in both dialects, plus the
///  PostgreSQL names the rules emit. These are never reported, whatever
///  their name looks like.
const PORTABLE: &[&str] = &[
    "ABS",
    "ARRAY_POSITION",
    "AVG",
    "CEIL",
    "CEILING",
    "CHAR_LENGTH",
    "COALESCE",
    "CONCAT",
    "CONCAT_WS",
    "COUNT",
    "DATE_PART",
    "DATE_TRUNC",
    "EXISTS",
    "EXP",
    "FLOOR",
    "GREATEST",
    "LEAST",
    "LEFT",
    "LENGTH",
    "LN",
    "LOWER",
    "LPAD",
    "LTRIM",
    "MAX",
    "MIN",
    "MOD",
    "NULLIF",
    "POWER",
    "REPLACE",
    "REVERSE",
    "RIGHT",
    "ROUND",
    "RPAD",
    "RTRIM",
    "SIGN",
    "SQRT",
    "SUBSTR",
    "SUBSTRING",
    "SUM",
    "TRIM",
    "UPPER",
];

const AGGREGATES: &[&str] = &[
    "ARRAY_AGG",
    "AVG",
    "BIT_AND",
    "BIT_OR",
    "BIT_XOR",
    "BOOL_AND",
    "BOOL_OR",
    "COUNT",
    "GROUP_CONCAT",
    "JSON_ARRAYAGG",
    "JSON_OBJECTAGG",
    "MAX",
    "MIN",
    "STD",
    "STDDEV",
    "STDDEV_POP",
    "STDDEV_SAMP",
    "STRING_AGG",
    "SUM",
    "VARIANCE",
    "VAR_POP",
    "VAR_SAMP",
];

fn contains(list: &[&str], name: &str) -> bool {
    list.iter().any(|f| f.eq_ignore_ascii_case(name))
}

pub fn is_portable(name: &str) -> bool {
    contains(PORTABLE, name)
}

pub fn is_aggregate(name: &str) -> bool {
    contains(AGGREGATES, name)
}

/// Heuristic for function calls left over after the rule table ran: names
///  shaped like MySQL date/string/null helpers that nothing rewrote.
pub fn looks_mysql_specific(name: &str) -> bool {
    if is_portable(name) || MysqlFunction::from_name(name).is_some() {
        return false;
    }
    let upper = name.to_ascii_uppercase();
    upper.starts_with("DATE_")
        || upper.starts_with("STR_")
        || upper.starts_with("IF")
        || upper.contains("NULL")
        || upper.ends_with("_UNIXTIME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!(
            MysqlFunction::from_name("group_concat"),
            Some(MysqlFunction::GROUP_CONCAT)
        );
        assert_eq!(MysqlFunction::from_name("Date_Format"), Some(MysqlFunction::DATE_FORMAT));
        assert_eq!(MysqlFunction::from_name("NULLIF"), None);
        assert_eq!(MysqlFunction::TIMESTAMPDIFF.name(), "TIMESTAMPDIFF");
        assert_eq!(MysqlFunction::STR_TO_DATE.to_string(), "STR_TO_DATE");
    }

    #[test]
    fn nullif_is_never_suspicious() {
        assert!(!looks_mysql_specific("NULLIF"));
        assert!(!looks_mysql_specific("nullif"));
        assert!(!looks_mysql_specific("COALESCE"));
        assert!(looks_mysql_specific("IFNULLX"));
        assert!(looks_mysql_specific("DATE_TRUNCATE"));
    }

    #[test]
    fn aggregates() {
        assert!(is_aggregate("count"));
        assert!(is_aggregate("GROUP_CONCAT"));
        assert!(!is_aggregate("COALESCE"));
    }
}

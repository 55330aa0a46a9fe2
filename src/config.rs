//! Compiled-in conversion tables. Bump [TABLE_VERSION] whenever one of the
//!  tables here (or the date format table) changes meaning.

use std::collections::HashSet;
use std::sync::LazyLock;

pub const TABLE_VERSION: u32 = 3;

/// Average seconds per Gregorian month (365.2425 * 86400 / 12). Used for
///  `TIMESTAMPDIFF(MONTH, ...)`, which is lossy at day-level precision.
pub const SECONDS_PER_MONTH: u64 = 2_629_746;

/// Columns stored as `BOOLEAN` on the PostgreSQL side but compared against
///  `0`/`1` by the MySQL-era queries.
pub const DEFAULT_BOOLEAN_COLUMNS: &[&str] = &[
    "active",
    "archived",
    "deleted",
    "email_verified",
    "enabled",
    "is_active",
    "is_admin",
    "is_archived",
    "is_deleted",
    "is_enabled",
    "is_paid",
    "is_primary",
    "is_public",
    "is_verified",
    "paid",
    "verified",
];

/// How a placeholder that ends up in the output more than once is numbered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamMode {
    /// Every copy reuses the same `$k`; the parameter list keeps its length.
    #[default]
    Reuse,
    /// Every copy gets its own `$k` and the bound value is duplicated.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Lowercased, unqualified column names
    boolean_columns: HashSet<String>,
    pub param_mode: ParamMode,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            boolean_columns: DEFAULT_BOOLEAN_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            param_mode: ParamMode::default(),
        }
    }
}

impl ConversionConfig {
    /// Replaces the boolean column set.
    pub fn with_boolean_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.boolean_columns = columns
            .into_iter()
            .map(|c| c.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_param_mode(mut self, param_mode: ParamMode) -> Self {
        self.param_mode = param_mode;
        self
    }

    pub fn is_boolean_column(&self, name: &str) -> bool {
        self.boolean_columns.contains(&name.to_ascii_lowercase())
    }
}

/// Shared by every call that doesn't bring its own configuration.
pub static DEFAULT_CONFIG: LazyLock<ConversionConfig> = LazyLock::new(ConversionConfig::default);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_columns_are_case_insensitive() {
        assert!(DEFAULT_CONFIG.is_boolean_column("IS_ACTIVE"));
        assert!(!DEFAULT_CONFIG.is_boolean_column("status"));

        let config = ConversionConfig::default().with_boolean_columns(["Flagged"]);
        assert!(config.is_boolean_column("flagged"));
        assert!(!config.is_boolean_column("is_active"));
    }

    #[test]
    fn month_constant() {
        // 365.2425 days * 86400 s
        assert_eq!(SECONDS_PER_MONTH * 12, 31_556_952);
    }
}

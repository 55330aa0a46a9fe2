use tracing::debug;

/// Stable warning codes. Callers may match on these, so never rename one.
pub mod codes {
    pub const UNSUPPORTED_FUNCTION: &str = "unsupported-function";
    pub const UNSUPPORTED_SYNTAX: &str = "unsupported-syntax";
    pub const UNSAFE_ARGUMENT: &str = "unsafe-argument";
    pub const UNKNOWN_UNIT: &str = "unknown-unit";
    pub const DATE_FORMAT_TOKEN: &str = "date-format-token";
    pub const LOSSY_MONTH_DIFF: &str = "lossy-month-diff";
    pub const CHARSET_DROPPED: &str = "charset-dropped";
    pub const AMBIGUOUS_ALIAS: &str = "ambiguous-alias";
    pub const AGGREGATE_ALIAS: &str = "aggregate-alias";
    pub const ALIAS_SHADOWS_COLUMN: &str = "alias-shadows-column";
    pub const PARAM_COUNT: &str = "param-count";
    pub const MIXED_PLACEHOLDERS: &str = "mixed-placeholders";
    pub const SUSPICIOUS_FUNCTION: &str = "suspicious-function";
}

#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Rewritten, but the caller should know how
    Info,
    /// Left verbatim; will probably fail on PostgreSQL
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionWarning {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    /// The offending source excerpt, when there is one
    pub snippet: Option<String>,
}

impl ConversionWarning {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            snippet: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl std::fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(snippet) = &self.snippet {
            write!(f, " ({snippet})")?;
        }
        Ok(())
    }
}

/// Accumulates warnings for one conversion. Warnings are reported in the
///  order they were raised.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<ConversionWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ConversionWarning) {
        debug!(
            severity = %warning.severity,
            code = warning.code,
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    pub fn info(&mut self, code: &'static str, message: impl Into<String>, snippet: &str) {
        self.push(ConversionWarning::new(Severity::Info, code, message).with_snippet(snippet));
    }

    pub fn unsupported(&mut self, code: &'static str, message: impl Into<String>, snippet: &str) {
        self.push(
            ConversionWarning::new(Severity::Unsupported, code, message).with_snippet(snippet),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversionWarning> {
        self.warnings.iter()
    }

    pub fn into_vec(self) -> Vec<ConversionWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.unsupported(codes::UNSUPPORTED_FUNCTION, "ELT has no equivalent", "ELT(1, a)");
        diagnostics.info(codes::LOSSY_MONTH_DIFF, "approximate", "TIMESTAMPDIFF(...)");
        assert_eq!(diagnostics.len(), 2);

        let warnings = diagnostics.into_vec();
        assert_eq!(warnings[0].severity, Severity::Unsupported);
        assert_eq!(warnings[1].code, "lossy-month-diff");
        assert_eq!(
            warnings[0].to_string(),
            "[unsupported] unsupported-function: ELT has no equivalent (ELT(1, a))"
        );
    }
}

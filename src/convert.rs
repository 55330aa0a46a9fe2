//! The conversion pipeline. Pass order is fixed:
//!
//! 1. mask literals, identifiers and comments
//! 2. tag `?` placeholders with their parameter index
//! 3. function and operator rules, then flag MySQL-looking leftovers
//! 4. collations, `BINARY`, integer booleans
//! 5. projection consistency (`GROUP BY`/`HAVING`/`ORDER BY`)
//! 6. number the tags `$1..$n` and line the parameters up with them
//! 7. unmask

use tracing::{debug, warn};

use crate::{
    config::{ConversionConfig, DEFAULT_CONFIG},
    diagnostics::{ConversionWarning, Diagnostics, Severity, codes},
    error::{Error, Result},
    mask::{self, MaskedQuery},
    normalize,
    placeholders::{self, Renumbered},
    projection,
    translate::{self, RuleContext, postgres::RULES},
    value::Value,
};

/// Longest snippet attached to a warning, in chars.
const MAX_SNIPPET: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult<V = Value> {
    /// PostgreSQL text with `$n` placeholders
    pub query: String,
    /// Parameters in `$n` order
    pub params: Vec<V>,
    pub warnings: Vec<ConversionWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestConversion {
    pub converted: String,
    pub warnings: Vec<ConversionWarning>,
}

/// A MySQL query and the values bound to its `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery<V = Value> {
    pub sql: String,
    pub params: Vec<V>,
}

impl<V: Clone> RawQuery<V> {
    pub fn new(sql: impl Into<String>, params: Vec<V>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Converts with the default configuration.
    pub fn convert(&self) -> Result<ConversionResult<V>> {
        convert(&self.sql, &self.params)
    }
}

/// Runs conversions against one configuration. Holds no per-query state,
///  so one instance can be shared by any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct Converter<'c> {
    config: &'c ConversionConfig,
}

impl Default for Converter<'static> {
    fn default() -> Self {
        Self {
            config: &DEFAULT_CONFIG,
        }
    }
}

impl<'c> Converter<'c> {
    pub fn new(config: &'c ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        self.config
    }

    /// Translates [raw] to PostgreSQL and reorders [params] to match the new
    ///  placeholder numbering. Fails only on structurally broken input;
    ///  anything merely untranslatable comes back verbatim with a warning.
    pub fn convert<V: Clone>(&self, raw: &str, params: &[V]) -> Result<ConversionResult<V>> {
        let res = self.run(raw, params);
        match &res {
            Ok(res) => debug!(
                params = res.params.len(),
                warnings = res.warnings.len(),
                "converted query"
            ),
            Err(e) => warn!(error = %e, "query conversion aborted"),
        }
        res
    }

    /// Same pipeline without parameters, for tooling and tests.
    pub fn test_conversion(&self, raw: &str) -> Result<TestConversion> {
        let res = self.convert::<Value>(raw, &[])?;
        Ok(TestConversion {
            converted: res.query,
            warnings: res
                .warnings
                .into_iter()
                .filter(|w| w.code != codes::PARAM_COUNT)
                .collect(),
        })
    }

    fn run<V: Clone>(&self, raw: &str, params: &[V]) -> Result<ConversionResult<V>> {
        if raw.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        let mut diagnostics = Diagnostics::new();

        let mut masked = mask::mask(raw)?;
        let tagged = placeholders::tag(&masked.text)?;
        if tagged.has_numbered && tagged.count > 0 {
            diagnostics.push(ConversionWarning::new(
                Severity::Info,
                codes::MIXED_PLACEHOLDERS,
                "query mixes `?` and `$n` placeholders; `$n` are left as written",
            ));
        }

        let text = {
            let mut cx = RuleContext {
                mask: &mut masked,
                diagnostics: &mut diagnostics,
            };
            let text = translate::apply(tagged.text, RULES, &mut cx)?;
            translate::flag_leftovers(&text, &mut cx)?;
            text
        };

        let text = normalize::strip_collations(&text, &masked)?;
        let text = normalize::strip_binary(&text)?;
        let text = normalize::booleans(&text, &masked, self.config)?;
        let text = projection::fix(&text, &masked, &mut diagnostics)?;

        let Renumbered { text, params } = placeholders::renumber(
            &text,
            params,
            tagged.count,
            self.config.param_mode,
            &mut diagnostics,
        )?;

        Ok(ConversionResult {
            query: masked.unmask(&text),
            params,
            warnings: readable_warnings(diagnostics, &masked),
        })
    }
}

/// Snippets are collected from masked text; put the literals back.
fn readable_warnings(diagnostics: Diagnostics, mask: &MaskedQuery) -> Vec<ConversionWarning> {
    diagnostics
        .into_vec()
        .into_iter()
        .map(|mut warning| {
            warning.snippet = warning
                .snippet
                .map(|s| truncate(placeholders::untag(&mask.unmask(&s))))
                .filter(|s| !s.is_empty());
            warning
        })
        .collect()
}

fn truncate(mut s: String) -> String {
    if let Some((cut, _)) = s.char_indices().nth(MAX_SNIPPET) {
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

/// Converts with the default configuration.
pub fn convert<V: Clone>(raw: &str, params: &[V]) -> Result<ConversionResult<V>> {
    Converter::default().convert(raw, params)
}

/// Converts with the default configuration, without parameters.
pub fn test_conversion(raw: &str) -> Result<TestConversion> {
    Converter::default().test_conversion(raw)
}

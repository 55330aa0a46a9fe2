use crate::lex::QuoteKind;

/// Structural failures: input that cannot be masked or balance-matched
///  safely. A query that fails with one of these must not be sent to the
///  database. Everything else degrades to a warning instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("empty query")]
    EmptyQuery,
    #[error("unterminated {kind} starting at byte {offset}")]
    UnterminatedLiteral { kind: QuoteKind, offset: usize },
    #[error("unterminated block comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },
    #[error("unbalanced parentheses near byte {offset}")]
    UnbalancedParentheses { offset: usize },
    /// A bare word spelled like one of the converter's internal placeholders
    #[error("reserved word `{word}` at byte {offset}")]
    ReservedWord { word: String, offset: usize },
}

impl Error {
    /// The message shown at the user-facing boundary. Rule names and offsets
    ///  only go to logs.
    pub fn user_message(&self) -> &'static str {
        "query translation error"
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offset() {
        let err = Error::UnterminatedLiteral {
            kind: QuoteKind::Single,
            offset: 14,
        };
        assert_eq!(
            err.to_string(),
            "unterminated single-quoted string starting at byte 14"
        );
        assert_eq!(err.user_message(), "query translation error");
    }
}

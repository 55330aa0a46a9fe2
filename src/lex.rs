/// #Notes
/// The same lexer runs over the raw MySQL text (where quoted spans and
///  comments are recognised so they can be masked) and over the masked text,
///  where those token kinds no longer occur. Whitespace is never tokenized:
///  callers recover it from the gaps between token spans.
///
/// `+` and `-` are always operators; a leading sign is never part of a
///  Number token.
use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenType {
    ParenLeft,
    ParenRight,
    Comma,
    Dot,
    Semicolon,
    /// `?`, the MySQL positional placeholder
    Question,
    /// `$1`, `$2`, ... (already PostgreSQL style)
    NumberedParam,
    Operator,
    Number,
    Word,
    StringSingleQuote,
    StringDoubleQuote,
    Backtick,
    LineComment,
    BlockComment,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuoteKind {
    Single,
    Double,
    Backtick,
}

impl std::fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single-quoted string"),
            Self::Double => write!(f, "double-quoted string"),
            Self::Backtick => write!(f, "backtick-quoted identifier"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub ty: TokenType,

    // Byte indexes into the source
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Literals and comments: the spans the mask replaces.
    pub fn is_opaque(&self) -> bool {
        matches!(
            self.ty,
            TokenType::StringSingleQuote
                | TokenType::StringDoubleQuote
                | TokenType::Backtick
                | TokenType::LineComment
                | TokenType::BlockComment
        )
    }
}

#[inline]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

#[inline]
fn is_ident_continuation(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// This type simply holds a reference to the source and an index, so it's
///  cheap to copy, which makes lookahead and rewind trivial.
#[derive(Clone)]
pub struct Lexer<'input> {
    source: &'input str,
    current: usize,
}

impl<'input> Lexer<'input> {
    pub fn new(source: &'input str) -> Self {
        Self { source, current: 0 }
    }

    #[inline]
    fn bytes(&self) -> &'input [u8] {
        self.source.as_bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current >= self.source.len()
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.bytes().get(self.current).copied()
    }

    #[inline]
    pub fn peek_at(&self, at: usize) -> Option<u8> {
        self.bytes().get(self.current + at).copied()
    }

    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        let res = self.peek();
        if res.is_some() {
            self.current += 1;
        }
        res
    }

    /// If current starts with [prefix], consume it and return true.
    pub fn consume1(&mut self, prefix: u8) -> bool {
        if let Some(c) = self.peek()
            && c == prefix
        {
            self.current += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    fn consume_while(&mut self, predicate: impl Fn(u8) -> bool) {
        while let Some(c) = self.peek()
            && predicate(c)
        {
            self.current += 1;
        }
    }

    #[inline]
    fn consume_whitespace(&mut self) {
        self.consume_while(|b| b.is_ascii_whitespace());
    }

    fn consume_number(&mut self) {
        self.consume_while(|b| b.is_ascii_digit());
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.current += 1;
            self.consume_while(|b| b.is_ascii_digit());
        }
        // Exponents and hex literals (1e10, 0x1F) ride along as one token
        self.consume_while(is_ident_continuation);
    }

    /// Consumes a quoted span whose opening quote was already popped.
    /// Backslash escapes apply to strings but not to backtick identifiers;
    ///  a doubled terminator is an escaped terminator in all three.
    fn consume_quoted(&mut self, term: u8, backslash_escapes: bool) -> bool {
        while let Some(c) = self.pop() {
            if backslash_escapes && c == b'\\' {
                if self.pop().is_none() {
                    return false;
                }
            } else if c == term {
                if self.peek() == Some(term) {
                    self.current += 1;
                } else {
                    return true;
                }
            }
        }
        false
    }

    /// Returns the slice of the source that this token was lexed from.
    #[inline]
    pub fn source_of(&self, token: &Token) -> &'input str {
        &self.source[token.start..token.end]
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.consume_whitespace();

        let Some(first) = self.pop() else {
            return Ok(None);
        };
        let start = self.current - 1;

        // Convenience macro for returning a token from `start` to `self.current`
        // The match below borrows self as mutable, so a simple closure won't
        //  do the trick.
        macro_rules! tok {
            ($name:ident) => {{
                Token {
                    ty: TokenType::$name,
                    start,
                    end: self.current,
                }
            }};
        }

        Ok(Some(match first {
            b'(' => tok!(ParenLeft),
            b')' => tok!(ParenRight),
            b',' => tok!(Comma),
            b';' => tok!(Semicolon),
            b'?' => tok!(Question),
            b'.' => {
                // `.5` is a number unless it follows an identifier (`t.5`)
                let after_ident = start > 0 && is_ident_continuation(self.bytes()[start - 1]);
                if !after_ident && self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.consume_number();
                    tok!(Number)
                } else {
                    tok!(Dot)
                }
            }
            b'$' => {
                if self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.consume_while(|b| b.is_ascii_digit());
                    tok!(NumberedParam)
                } else {
                    tok!(Operator)
                }
            }

            b'\'' => {
                if !self.consume_quoted(b'\'', true) {
                    return Err(Error::UnterminatedLiteral {
                        kind: QuoteKind::Single,
                        offset: start,
                    });
                }
                tok!(StringSingleQuote)
            }
            b'"' => {
                if !self.consume_quoted(b'"', true) {
                    return Err(Error::UnterminatedLiteral {
                        kind: QuoteKind::Double,
                        offset: start,
                    });
                }
                tok!(StringDoubleQuote)
            }
            b'`' => {
                if !self.consume_quoted(b'`', false) {
                    return Err(Error::UnterminatedLiteral {
                        kind: QuoteKind::Backtick,
                        offset: start,
                    });
                }
                tok!(Backtick)
            }

            // MySQL only treats `--` as a comment when whitespace follows it
            b'-' if self.peek() == Some(b'-')
                && self.peek_at(1).is_none_or(|b| b.is_ascii_whitespace()) =>
            {
                self.consume_while(|b| b != b'\n');
                tok!(LineComment)
            }
            b'#' => {
                self.consume_while(|b| b != b'\n');
                tok!(LineComment)
            }
            b'/' if self.peek() == Some(b'*') => {
                self.current += 1;
                loop {
                    match self.pop() {
                        None => return Err(Error::UnterminatedComment { offset: start }),
                        Some(b'*') if self.consume1(b'/') => break,
                        Some(_) => {}
                    }
                }
                tok!(BlockComment)
            }

            b'0'..=b'9' => {
                self.consume_number();
                tok!(Number)
            }
            b if is_ident_start(b) => {
                self.consume_while(is_ident_continuation);
                tok!(Word)
            }

            // Multi-character operators are kept whole so that passes can
            //  compare them by text
            b'<' => {
                if self.consume1(b'=') {
                    self.consume1(b'>');
                } else if !self.consume1(b'>') {
                    self.consume1(b'<');
                }
                tok!(Operator)
            }
            b'>' => {
                if !self.consume1(b'=') {
                    self.consume1(b'>');
                }
                tok!(Operator)
            }
            b'!' => {
                if !self.consume1(b'=') && self.consume1(b'~') {
                    self.consume1(b'*');
                }
                tok!(Operator)
            }
            b'~' => {
                self.consume1(b'*');
                tok!(Operator)
            }
            b'-' => {
                if self.consume1(b'>') {
                    self.consume1(b'>');
                }
                tok!(Operator)
            }
            b'|' => {
                self.consume1(b'|');
                tok!(Operator)
            }
            b'&' => {
                self.consume1(b'&');
                tok!(Operator)
            }
            b':' => {
                if !self.consume1(b':') {
                    self.consume1(b'=');
                }
                tok!(Operator)
            }
            _ => tok!(Operator),
        }))
    }
}

/// Lexes all of [source].
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// A token vector plus the source it came from and the paren depth of each
///  token. A `(` and its matching `)` share a depth; everything between them
///  sits one level deeper.
pub struct TokenList<'input> {
    source: &'input str,
    tokens: Vec<Token>,
    depths: Vec<u32>,
}

impl<'input> TokenList<'input> {
    pub fn new(source: &'input str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut depths = Vec::with_capacity(tokens.len());
        let mut level = 0u32;
        for token in &tokens {
            match token.ty {
                TokenType::ParenLeft => {
                    depths.push(level);
                    level += 1;
                }
                TokenType::ParenRight => {
                    level = level.saturating_sub(1);
                    depths.push(level);
                }
                _ => depths.push(level),
            }
        }
        Ok(Self {
            source,
            tokens,
            depths,
        })
    }

    #[inline]
    pub fn source(&self) -> &'input str {
        self.source
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    #[inline]
    pub fn ty(&self, index: usize) -> Option<TokenType> {
        self.tokens.get(index).map(|t| t.ty)
    }

    #[inline]
    pub fn depth(&self, index: usize) -> u32 {
        self.depths.get(index).copied().unwrap_or(0)
    }

    /// Source text of one token ("" when out of range).
    pub fn text(&self, index: usize) -> &'input str {
        self.tokens
            .get(index)
            .map(|t| &self.source[t.start..t.end])
            .unwrap_or("")
    }

    /// Source text from the start of token [from] to the end of token [to]
    ///  (inclusive), whitespace and all.
    pub fn slice(&self, from: usize, to: usize) -> &'input str {
        match (self.tokens.get(from), self.tokens.get(to)) {
            (Some(a), Some(b)) if a.start <= b.end => &self.source[a.start..b.end],
            _ => "",
        }
    }

    /// True if token [index] is the word [keyword] (ASCII case insensitive).
    pub fn is_keyword(&self, index: usize, keyword: &str) -> bool {
        self.ty(index) == Some(TokenType::Word) && self.text(index).eq_ignore_ascii_case(keyword)
    }

    /// Matches a run of consecutive keywords (`GROUP BY`, `NULLS LAST`) at
    ///  [index] and returns the index just past them.
    pub fn keywords_at(&self, index: usize, keywords: &[&str]) -> Option<usize> {
        keywords
            .iter()
            .enumerate()
            .all(|(offset, kw)| self.is_keyword(index + offset, kw))
            .then_some(index + keywords.len())
    }

    /// Index of the `)` matching the `(` at [open].
    pub fn matching_paren(&self, open: usize) -> Result<usize> {
        let depth = self.depth(open);
        let unbalanced = || Error::UnbalancedParentheses {
            offset: self.tokens.get(open).map(|t| t.start).unwrap_or(0),
        };
        if self.ty(open) != Some(TokenType::ParenLeft) {
            return Err(unbalanced());
        }
        (open + 1..self.tokens.len())
            .find(|&i| self.tokens[i].ty == TokenType::ParenRight && self.depths[i] == depth)
            .ok_or_else(unbalanced)
    }

    /// Splits the tokens in `from..to` at commas sitting at [depth]. Returns
    ///  the token ranges of each piece (possibly empty).
    pub fn split_commas(&self, from: usize, to: usize, depth: u32) -> Vec<(usize, usize)> {
        let mut pieces = Vec::new();
        let mut piece_start = from;
        for i in from..to {
            if self.tokens[i].ty == TokenType::Comma && self.depths[i] == depth {
                pieces.push((piece_start, i));
                piece_start = i + 1;
            }
        }
        pieces.push((piece_start, to));
        pieces
    }

    /// True when token [index] is preceded by a `.`, i.e. it's the second half
    ///  of a qualified name.
    pub fn is_qualified(&self, index: usize) -> bool {
        index > 0 && self.ty(index - 1) == Some(TokenType::Dot)
    }
}

//! Token types for the expression lexer.

use super::Span;

/// The kind of token.
///
/// The lexer is shallow: it only distinguishes what the
/// resolver needs to find field names and table aliases in a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Single-quoted string literal, quotes included in the text.
    String,
    /// Backtick-quoted identifier, backticks stripped from the text.
    Identifier,
    /// `?`
    Placeholder,
    /// A bare word: keyword, function name, alias or unquoted field name.
    Word,
    /// Integer literal.
    Number,
    /// Arithmetic, comparison and list operators, parentheses, plus `LIKE`
    /// and `AS`.
    Operator,
    /// (
    ///
    /// Not produced by the tokenizer, which lexes parentheses as operators.
    OpenParen,
    /// )
    ///
    /// Not produced by the tokenizer, which lexes parentheses as operators.
    CloseParen,
    /// .
    Dot,
    /// A run of spaces, tabs, carriage returns and newlines.
    Whitespace,
}

impl TokenKind {
    /// Returns the upper-case name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Identifier => "IDENTIFIER",
            Self::Placeholder => "PLACEHOLDER",
            Self::Word => "WORD",
            Self::Number => "NUMBER",
            Self::Operator => "OPERATOR",
            Self::OpenParen => "OPEN_PAREN",
            Self::CloseParen => "CLOSE_PAREN",
            Self::Dot => "DOT",
            Self::Whitespace => "WHITESPACE",
        }
    }
}

/// A token with its text and its span in the source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The token text. Identical to the source slice except for
    /// identifiers, whose backticks are removed.
    pub text: String,
    /// The location in the source expression.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// Returns true if the token has the given kind.
    #[must_use]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Returns the exact source text of this token, delimiters included.
    #[must_use]
    pub fn raw<'a>(&self, source: &'a str) -> &'a str {
        self.span.slice(source)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

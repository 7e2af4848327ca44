//! Expression tokenizer implementation.

use super::{Span, Token, TokenKind};

/// A lexer over a single SQL expression fragment.
///
/// Every byte of the input belongs to exactly one token; nothing is
/// skipped, so the spans of the produced tokens tile the input.
pub struct Lexer<'a> {
    /// The input expression.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given expression.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consumes the current character if it satisfies `accept`.
    fn eat(&mut self, accept: impl Fn(char) -> bool) -> bool {
        match self.peek() {
            Some(c) if accept(c) => {
                self.pos += c.len_utf8();
                true
            }
            _ => false,
        }
    }

    fn eat_while(&mut self, accept: impl Fn(char) -> bool) {
        while self.eat(&accept) {}
    }

    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos)
    }

    /// Creates a token whose text is the full source slice.
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, &self.input[self.start..self.pos], self.make_span())
    }

    /// Scans a string literal; the opening quote is already consumed.
    fn scan_string(&mut self) -> Token {
        while let Some(c) = self.advance() {
            match c {
                '\\' => {
                    self.advance();
                }
                '\'' => break,
                _ => {}
            }
        }
        self.make_token(TokenKind::String)
    }

    /// Scans a backtick identifier; the opening backtick is already consumed.
    fn scan_identifier(&mut self) -> Token {
        let content_start = self.pos;
        let mut content_end = self.input.len();
        while let Some(c) = self.advance() {
            if c == '`' {
                content_end = self.pos - 1;
                break;
            }
        }
        Token::new(
            TokenKind::Identifier,
            &self.input[content_start..content_end],
            self.make_span(),
        )
    }

    /// Scans a word; the first character is already consumed.
    fn scan_word(&mut self) -> Token {
        self.eat_while(is_word_char);
        let mut token = self.make_token(TokenKind::Word);
        let upper = token.text.to_ascii_uppercase();
        if upper == "LIKE" || upper == "AS" {
            token.kind = TokenKind::Operator;
        }
        token
    }

    /// Scans the next token, or returns `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        self.start = self.pos;
        let c = self.advance()?;

        let token = match c {
            '\'' => self.scan_string(),
            '`' => self.scan_identifier(),
            '?' => self.make_token(TokenKind::Placeholder),
            '.' => self.make_token(TokenKind::Dot),
            '(' | ')' | ',' | '+' | '-' | '*' | '/' | '=' => self.make_token(TokenKind::Operator),
            '<' => {
                self.eat(|c| c == '>' || c == '=');
                self.make_token(TokenKind::Operator)
            }
            '>' | '!' => {
                self.eat(|c| c == '=');
                self.make_token(TokenKind::Operator)
            }
            c if c.is_ascii_digit() => {
                self.eat_while(|c| c.is_ascii_digit());
                self.make_token(TokenKind::Number)
            }
            c if is_whitespace(c) => {
                self.eat_while(is_whitespace);
                self.make_token(TokenKind::Whitespace)
            }
            _ => self.scan_word(),
        };

        Some(token)
    }

    /// Tokenizes the entire input.
    #[must_use]
    pub fn tokenize(self) -> Vec<Token> {
        self.collect()
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

const fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenizes an expression fragment.
///
/// ```rust
/// use oxide_query::lexer::{tokenize, TokenKind};
///
/// let kinds: Vec<TokenKind> = tokenize("name = ?").into_iter().map(|t| t.kind).collect();
/// assert_eq!(kinds, vec![
///     TokenKind::Word,
///     TokenKind::Whitespace,
///     TokenKind::Operator,
///     TokenKind::Whitespace,
///     TokenKind::Placeholder,
/// ]);
/// ```
#[must_use]
pub fn tokenize(expression: &str) -> Vec<Token> {
    Lexer::new(expression).tokenize()
}

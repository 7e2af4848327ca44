//! SQL expression lexer.
//!
//! This module provides a hand-written lexer for SQL *fragments* (WHERE
//! predicates, join conditions, computed field expressions). It is not a
//! full SQL lexer: it produces just enough structure for the resolver to
//! find field names and table aliases, and keeps every input byte.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Token, TokenKind};
pub use tokenizer::{tokenize, Lexer};

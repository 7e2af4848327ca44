//! Expression resolution and alias remapping.
//!
//! Callers write expressions in terms of a query's *external* field names
//! (`total > 10`, `` `order` = ? ``). Before such an expression can be put
//! into SQL it has to be rewritten in terms of the query's sources
//! (`t1.`total` > 10`). Remapping is the second half of the story: when a
//! simple query is folded into another, its table aliases change and every
//! expression that mentions them has to follow.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::field::FieldExpr;
use crate::error::{QueryError, Result};
use crate::lexer::{tokenize, TokenKind};

/// Old table alias to new table alias.
pub type AliasMap = HashMap<String, String>;

/// Rewrites the field names in `expression` into qualified references.
///
/// Backtick identifiers must name a field; bare words are substituted only
/// when they happen to name one (everything else is a keyword, function
/// name or literal). A name directly after a `.` is already qualified and
/// is left alone.
///
/// # Errors
///
/// Returns [`QueryError::UnresolvedField`] for a backtick identifier that
/// names no field.
pub fn resolve(expression: &str, fields: &IndexMap<String, FieldExpr>) -> Result<String> {
    let mut resolved = String::with_capacity(expression.len());
    let mut qualified = false;

    for token in tokenize(expression) {
        match token.kind {
            TokenKind::Identifier if !qualified => match fields.get(&token.text) {
                Some(field) => resolved.push_str(&field.to_operand()),
                None => {
                    return Err(QueryError::UnresolvedField {
                        token: token.text,
                        expression: expression.to_string(),
                    })
                }
            },
            TokenKind::Word if !qualified => match fields.get(&token.text) {
                Some(field) => resolved.push_str(&field.to_operand()),
                None => resolved.push_str(token.raw(expression)),
            },
            _ => resolved.push_str(token.raw(expression)),
        }
        qualified = token.kind == TokenKind::Dot;
    }

    Ok(resolved)
}

/// Rewrites the table alias in front of every `.` through `mapping`.
#[must_use]
pub fn remap(expression: &str, mapping: &AliasMap) -> String {
    let tokens = tokenize(expression);
    let mut remapped = String::with_capacity(expression.len());

    for (index, token) in tokens.iter().enumerate() {
        let qualifies = tokens
            .get(index + 1)
            .is_some_and(|next| next.kind == TokenKind::Dot);
        match mapping.get(&token.text) {
            Some(alias) if qualifies && token.kind == TokenKind::Word => remapped.push_str(alias),
            _ => remapped.push_str(token.raw(expression)),
        }
    }

    remapped
}

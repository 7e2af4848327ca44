//! Error types for query composition.

use thiserror::Error;

/// Errors raised while composing a query.
///
/// All of these indicate a defect in the calling code (a misspelled field,
/// a join over the wrong relations); they are reported immediately and are
/// never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A projection, grouping or ordering named a field the query lacks.
    #[error("unknown field [{field}]; available: [{}]", .available.join(", "))]
    UnknownField {
        /// The missing field.
        field: String,
        /// The fields the query does have, in order.
        available: Vec<String>,
    },

    /// A backtick identifier in an expression named no known field.
    #[error("unrecognized field [{token}] in expression [{expression}]")]
    UnresolvedField {
        /// The offending identifier.
        token: String,
        /// The expression as written by the caller.
        expression: String,
    },

    /// A natural join did not join over the fields the caller expected.
    #[error(
        "natural join of two relations does not meet expectations: [{}] versus [{}]",
        .expected.join(", "),
        .actual.join(", ")
    )]
    JoinChecksumMismatch {
        /// The fields the caller expected to join on.
        expected: Vec<String>,
        /// The fields the two relations actually share.
        actual: Vec<String>,
    },
}

/// Result type alias for query composition.
pub type Result<T> = std::result::Result<T, QueryError>;

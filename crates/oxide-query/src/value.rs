//! Record values and their SQL literal rendering.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single column value exchanged with the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value. Dates and times are carried as text.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

/// A record: field name to value, in field order.
pub type Record = IndexMap<String, Value>;

impl Value {
    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text if this is a `Text` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer where it has an exact integer form.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Loose truthiness: null, `false`, zero, the empty string and `"0"`
    /// are false, everything else is true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => !(s.is_empty() || s == "0"),
            Self::Blob(b) => !b.is_empty(),
        }
    }

    /// Returns the text used when this value keys a map entry.
    #[must_use]
    pub fn to_key(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => String::from(if *b { "1" } else { "" }),
            _ => self.to_string(),
        }
    }

    /// Returns the SQL representation for inline use.
    ///
    /// Text is single-quoted with embedded quotes doubled, booleans
    /// render as `1`/`0`, and null renders as `NULL`.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Text(s) => quote(&escape(s)),
            _ => self.to_sql_unquoted(),
        }
    }

    /// Renders every non-text value; text is returned unquoted.
    pub(crate) fn to_sql_unquoted(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Int(n) => n.to_string(),
            Self::Float(f) if f.is_finite() => f.to_string(),
            Self::Float(_) => String::from("NULL"),
            Self::Text(s) => s.clone(),
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("1"),
            Self::Bool(false) => Ok(()),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Escapes text for inclusion in a single-quoted SQL literal.
///
/// Backslashes are doubled as well as quotes, so the lexer never reads a
/// trailing backslash as escaping the closing quote.
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "''")
}

/// Wraps already-escaped text in single quotes.
#[must_use]
pub fn quote(escaped: &str) -> String {
    format!("'{escaped}'")
}

/// Trait for types that can be converted to record values.
pub trait ToValue {
    /// Converts the value to a `Value`.
    fn to_value(self) -> Value;
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

impl ToValue for &Value {
    fn to_value(self) -> Value {
        self.clone()
    }
}

impl ToValue for bool {
    fn to_value(self) -> Value {
        Value::Bool(self)
    }
}

impl ToValue for i64 {
    fn to_value(self) -> Value {
        Value::Int(self)
    }
}

impl ToValue for i32 {
    fn to_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl ToValue for u32 {
    fn to_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl ToValue for f64 {
    fn to_value(self) -> Value {
        Value::Float(self)
    }
}

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::Text(self)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::Text(String::from(self))
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(self) -> Value {
        Value::Blob(self)
    }
}

/// Builds a record from `(field, value)` pairs, preserving their order.
///
/// ```rust
/// use oxide_query::{record, Value};
///
/// let r = record([("name", Value::from_text("Ada")), ("age", Value::Int(36))]);
/// assert_eq!(r.keys().collect::<Vec<_>>(), vec!["name", "age"]);
/// ```
#[must_use]
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToValue,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_value()))
        .collect()
}

impl Value {
    /// Shorthand for `Value::Text`.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

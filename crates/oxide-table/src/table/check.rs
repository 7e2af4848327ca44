//! Record checks run before writes.

use oxide_query::{Record, Value};
use serde::{Deserialize, Serialize};

use super::criteria::Criteria;
use super::filter::{is_epoch, parse_timestamp};
use super::Table;
use crate::connection::Connection;
use crate::error::Result;

/// A validation rule over one or more fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "check", content = "options")]
pub enum Check {
    /// The field is present and not null.
    NotNull,
    /// The field is truthy.
    NotEmpty,
    /// The field is not an epoch or zero date.
    NotEpoch,
    /// No other row has the same value(s).
    Unique,
    /// The text form has at least this many characters.
    MinLength(usize),
    /// The text form has at most this many characters.
    MaxLength(usize),
    /// The date is strictly after the given date.
    MinDate(String),
    /// The value(s) exist in `fields` of `table`; null passes.
    MemberOf {
        /// Referenced table.
        table: String,
        /// Referenced columns, one per subject field.
        fields: Vec<String>,
    },
    /// Always fails: the record may not be written with checks on.
    ReadOnly,
}

/// The field or fields a check applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    /// A single field.
    Field(String),
    /// Several fields checked together.
    Fields(Vec<String>),
}

/// A failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckFailure {
    /// Name of the failed check.
    pub check: String,
    /// What was checked.
    pub subject: Subject,
    /// Check-specific detail: the conflicting id for `unique`, the offending
    /// value or length otherwise.
    pub detail: Value,
}

/// A check bound to its subject, as declared on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDecl {
    /// What is checked.
    pub subject: Subject,
    /// The rule.
    pub check: Check,
}

impl Subject {
    /// Returns the subject's fields.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Field(field) => vec![field.as_str()],
            Self::Fields(fields) => fields.iter().map(String::as_str).collect(),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fields().join(", "))
    }
}

impl From<&str> for Subject {
    fn from(field: &str) -> Self {
        Self::Field(field.to_string())
    }
}

impl From<String> for Subject {
    fn from(field: String) -> Self {
        Self::Field(field)
    }
}

impl<const N: usize> From<[&str; N]> for Subject {
    fn from(fields: [&str; N]) -> Self {
        Self::Fields(fields.iter().map(|f| (*f).to_string()).collect())
    }
}

impl From<Vec<String>> for Subject {
    fn from(fields: Vec<String>) -> Self {
        Self::Fields(fields)
    }
}

impl Check {
    /// Returns the check's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotNull => "not_null",
            Self::NotEmpty => "not_empty",
            Self::NotEpoch => "not_epoch",
            Self::Unique => "unique",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::MinDate(_) => "min_date",
            Self::MemberOf { .. } => "member_of",
            Self::ReadOnly => "read_only",
        }
    }

    /// Evaluates the check. Returns `None` when it passes and the failure
    /// detail otherwise.
    ///
    /// # Errors
    ///
    /// Propagates connection and query errors from checks that consult the
    /// database.
    pub async fn evaluate<C: Connection>(
        &self,
        db: &C,
        table: &Table,
        record: &Record,
        subject: &Subject,
        id: Option<i64>,
    ) -> Result<Option<Value>> {
        match self {
            Self::Unique => unique(db, table, record, subject, id).await,
            Self::MemberOf {
                table: referenced,
                fields,
            } => member_of(db, referenced, fields, record, subject).await,
            Self::ReadOnly => Ok(Some(Value::Null)),
            _ => Ok(subject
                .fields()
                .into_iter()
                .find_map(|field| self.evaluate_value(record.get(field)))),
        }
    }

    /// Evaluates a single-field check against one value.
    fn evaluate_value(&self, value: Option<&Value>) -> Option<Value> {
        let present = value.cloned().unwrap_or_default();
        match self {
            Self::NotNull => present.is_null().then_some(Value::Null),
            Self::NotEmpty => (!present.is_truthy()).then_some(present),
            Self::NotEpoch => is_epoch(&present).then_some(present),
            Self::MinLength(min) => {
                let length = present.to_string().chars().count();
                (length < *min).then(|| length_value(length))
            }
            Self::MaxLength(max) => {
                let length = present.to_string().chars().count();
                (length > *max).then(|| length_value(length))
            }
            Self::MinDate(bound) => {
                let after = match (
                    parse_timestamp(&present),
                    parse_timestamp(&Value::from_text(bound.as_str())),
                ) {
                    (Some(date), Some(bound)) => date > bound,
                    _ => false,
                };
                (!after).then_some(present)
            }
            Self::Unique | Self::MemberOf { .. } | Self::ReadOnly => None,
        }
    }
}

fn length_value(length: usize) -> Value {
    Value::Int(i64::try_from(length).unwrap_or(i64::MAX))
}

/// Passes when no row shares the subject's values, or the only match is the
/// record itself.
async fn unique<C: Connection>(
    db: &C,
    table: &Table,
    record: &Record,
    subject: &Subject,
    id: Option<i64>,
) -> Result<Option<Value>> {
    let values: Record = subject
        .fields()
        .into_iter()
        .map(|field| {
            (
                field.to_string(),
                record.get(field).cloned().unwrap_or_default(),
            )
        })
        .collect();
    let Some(found) = table.find(db, &Criteria::Fields(values)).await? else {
        return Ok(None);
    };
    if found == 0 || Some(found) == id {
        Ok(None)
    } else {
        Ok(Some(Value::Int(found)))
    }
}

/// Passes when the referenced table has a row with the subject's values.
async fn member_of<C: Connection>(
    db: &C,
    referenced: &str,
    referenced_fields: &[String],
    record: &Record,
    subject: &Subject,
) -> Result<Option<Value>> {
    let mut conditions = Vec::new();
    for (field, referenced_field) in subject.fields().into_iter().zip(referenced_fields) {
        let value = record.get(field).cloned().unwrap_or_default();
        if value.is_null() {
            return Ok(None);
        }
        conditions.push(db.format(&format!("`{referenced_field}` = ?"), &[value]));
    }
    if conditions.is_empty() {
        return Ok(None);
    }

    let sql = format!(
        "SELECT 1 AS found FROM `{referenced}` WHERE {} LIMIT 1",
        conditions.join(" AND ")
    );
    if db.query_exists(&sql).await? {
        Ok(None)
    } else {
        let first = subject.fields().first().copied().unwrap_or_default();
        Ok(Some(record.get(first).cloned().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::from_text(s)
    }

    #[test]
    fn test_presence_checks() {
        assert_eq!(Check::NotNull.evaluate_value(None), Some(Value::Null));
        assert_eq!(Check::NotNull.evaluate_value(Some(&Value::Null)), Some(Value::Null));
        assert_eq!(Check::NotNull.evaluate_value(Some(&text(""))), None);

        assert_eq!(Check::NotEmpty.evaluate_value(Some(&text("0"))), Some(text("0")));
        assert_eq!(Check::NotEmpty.evaluate_value(Some(&text("a"))), None);

        assert_eq!(
            Check::NotEpoch.evaluate_value(Some(&text("1970-01-01"))),
            Some(text("1970-01-01"))
        );
        assert_eq!(Check::NotEpoch.evaluate_value(Some(&text("2001-01-01"))), None);
    }

    #[test]
    fn test_length_checks() {
        assert_eq!(
            Check::MinLength(3).evaluate_value(Some(&text("ab"))),
            Some(Value::Int(2))
        );
        assert_eq!(Check::MinLength(3).evaluate_value(Some(&text("abc"))), None);
        assert_eq!(
            Check::MaxLength(2).evaluate_value(Some(&text("née!"))),
            Some(Value::Int(4))
        );
        assert_eq!(Check::MaxLength(4).evaluate_value(Some(&text("née!"))), None);
    }

    #[test]
    fn test_min_date() {
        let check = Check::MinDate(String::from("2000-01-01"));
        assert_eq!(check.evaluate_value(Some(&text("2000-01-02"))), None);
        assert_eq!(
            check.evaluate_value(Some(&text("2000-01-01"))),
            Some(text("2000-01-01"))
        );
        assert_eq!(check.evaluate_value(Some(&text("never"))), Some(text("never")));
    }

    #[test]
    fn test_subject_conversions() {
        assert_eq!(Subject::from("a"), Subject::Field(String::from("a")));
        let pair = Subject::from(["a", "b"]);
        assert_eq!(pair.fields(), vec!["a", "b"]);
        assert_eq!(pair.to_string(), "a, b");
    }

    #[test]
    fn test_check_names() {
        assert_eq!(Check::ReadOnly.name(), "read_only");
        assert_eq!(
            Check::MemberOf {
                table: String::from("t"),
                fields: vec![String::from("id")],
            }
            .name(),
            "member_of"
        );
    }
}

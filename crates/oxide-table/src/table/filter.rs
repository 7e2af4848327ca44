//! Value filters applied to records before they are checked and written.
//!
//! Coercions are loose: null becomes the type's zero value and
//! text is read as far as it looks like a number. Dates are read from
//! epoch seconds or common textual forms; anything unreadable becomes the
//! epoch.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use oxide_query::Value;
use serde::{Deserialize, Serialize};

/// The epoch as a `date` value.
pub const EPOCH_DATE: &str = "1970-01-01";

/// The epoch as a `datetime` value.
pub const EPOCH_DATETIME: &str = "1970-01-01 00:00:00";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Textual datetime forms accepted by the date coercions, in trial order.
const DATETIME_FORMATS: [&str; 4] = [
    DATETIME_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Textual date forms, tried after the datetime forms.
const DATE_FORMATS: [&str; 4] = [DATE_FORMAT, "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y"];

/// A single-value transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "filter", content = "options")]
pub enum Filter {
    /// Coerce to text.
    ToString,
    /// Coerce to a boolean by truthiness.
    ToBoolean,
    /// Coerce to a float.
    ToReal,
    /// Coerce to an integer.
    ToInteger,
    /// Leave times unchanged.
    ToTime,
    /// Coerce to `YYYY-MM-DD`.
    ToDate,
    /// Coerce to `YYYY-MM-DD HH:MM:SS`.
    ToDatetime,
    /// Replace falsy values with null.
    EmptyToNull,
    /// Replace epoch-like values with null.
    EpochToNull,
    /// Lowercase text.
    ToLowercase,
    /// Uppercase text.
    ToUppercase,
    /// Uppercase the first letter of every word.
    ToTitlecase,
    /// Snap values outside the options to the first option.
    OneOf(Vec<Value>),
}

impl Filter {
    /// Returns the filter's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ToString => "to_string",
            Self::ToBoolean => "to_boolean",
            Self::ToReal => "to_real",
            Self::ToInteger => "to_integer",
            Self::ToTime => "to_time",
            Self::ToDate => "to_date",
            Self::ToDatetime => "to_datetime",
            Self::EmptyToNull => "empty_to_null",
            Self::EpochToNull => "epoch_to_null",
            Self::ToLowercase => "to_lowercase",
            Self::ToUppercase => "to_uppercase",
            Self::ToTitlecase => "to_titlecase",
            Self::OneOf(_) => "one_of",
        }
    }

    /// Applies the filter.
    #[must_use]
    pub fn apply(&self, value: Value) -> Value {
        match self {
            Self::ToString => Value::Text(value.to_string()),
            Self::ToBoolean => Value::Bool(value.is_truthy()),
            Self::ToReal => Value::Float(to_real(&value)),
            Self::ToInteger => Value::Int(to_integer(&value)),
            Self::ToTime => value,
            Self::ToDate => Value::Text(
                parse_timestamp(&value)
                    .map_or_else(|| EPOCH_DATE.to_string(), |t| t.format(DATE_FORMAT).to_string()),
            ),
            Self::ToDatetime => Value::Text(parse_timestamp(&value).map_or_else(
                || EPOCH_DATETIME.to_string(),
                |t| t.format(DATETIME_FORMAT).to_string(),
            )),
            Self::EmptyToNull if !value.is_truthy() => Value::Null,
            Self::EpochToNull if is_epoch(&value) => Value::Null,
            Self::EmptyToNull | Self::EpochToNull => value,
            Self::ToLowercase => map_text(value, |s| s.to_lowercase()),
            Self::ToUppercase => map_text(value, |s| s.to_uppercase()),
            Self::ToTitlecase => map_text(value, titlecase),
            Self::OneOf(options) => {
                if options.is_empty() || options.contains(&value) {
                    value
                } else {
                    options[0].clone()
                }
            }
        }
    }
}

fn map_text(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::Text(text) => Value::Text(f(&text)),
        other => other,
    }
}

/// Uppercases the first character of every whitespace-separated word.
fn titlecase(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start {
            result.extend(c.to_uppercase());
        } else {
            result.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    result
}

/// Returns the longest leading prefix of `text` that reads as a number.
fn numeric_prefix(text: &str) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if seen_digit {
        &text[..end]
    } else {
        ""
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_real(value: &Value) -> f64 {
    match value {
        Value::Null | Value::Blob(_) => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        Value::Text(text) => numeric_prefix(text).parse().unwrap_or(0.0),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        Value::Text(text) => {
            let prefix = numeric_prefix(text);
            prefix
                .parse::<i64>()
                .unwrap_or_else(|_| prefix.parse::<f64>().map_or(0, |f| f as i64))
        }
        other => to_real(other) as i64,
    }
}

/// Reads a point in time from epoch seconds or common textual forms.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Int(seconds) => DateTime::from_timestamp(*seconds, 0).map(|t| t.naive_utc()),
        Value::Float(seconds) => DateTime::from_timestamp(*seconds as i64, 0).map(|t| t.naive_utc()),
        Value::Text(text) => parse_text_timestamp(text.trim()),
        _ => None,
    }
}

fn parse_text_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(seconds) = text.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0).map(|t| t.naive_utc());
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Returns true for values that stand for "no date": null, zero, and the
/// epoch or zero dates in text form.
#[must_use]
pub fn is_epoch(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Int(n) => *n == 0,
        Value::Float(f) => *f == 0.0,
        Value::Text(text) => matches!(
            text.trim(),
            "" | "0" | EPOCH_DATE | EPOCH_DATETIME | "0000-00-00" | "0000-00-00 00:00:00"
        ),
        Value::Blob(_) => false,
    }
}

//! Scalar type tags and value coercion.
//!
//! # Responsibility
//! - Define the type vocabulary virtual attributes are declared with.
//! - Coerce raw container values into the declared type.
//!
//! # Invariants
//! - `AttributeType::cast` is total: it never fails and never panics.
//! - Unparsable numeric input degrades to zero; unparsable dates degrade to
//!   `Null`.
//! - An absent type tag means identity (see `cast_with`).

use crate::model::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static INTEGER_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+").expect("valid integer prefix regex"));
static FLOAT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]+)?|\.[0-9]+)([eE][+-]?[0-9]+)?")
        .expect("valid float prefix regex")
});

const FALSE_WORDS: &[&str] = &["0", "f", "false", "off"];

/// Declared scalar type of a virtual attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
    /// Calendar date, stored as `YYYY-MM-DD`.
    Date,
    /// UTC timestamp, stored as RFC 3339.
    #[serde(rename = "datetime")]
    DateTime,
}

impl AttributeType {
    /// Stable lowercase tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
        }
    }

    /// Coerces a raw value into this type.
    pub fn cast(self, value: &Value) -> Value {
        match self {
            Self::String => cast_string(value),
            Self::Integer => cast_integer(value),
            Self::Float => cast_float(value),
            Self::Boolean => cast_boolean(value),
            Self::Date => cast_date(value),
            Self::DateTime => cast_datetime(value),
        }
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = UnknownTypeTag;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            other => Err(UnknownTypeTag(other.to_string())),
        }
    }
}

/// Unsupported type tag string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTypeTag(pub String);

impl Display for UnknownTypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported attribute type `{}`; expected string|integer|float|boolean|date|datetime",
            self.0
        )
    }
}

impl Error for UnknownTypeTag {}

/// Coerces through an optional type tag; `None` passes the value through.
pub fn cast_with(type_tag: Option<AttributeType>, value: &Value) -> Value {
    match type_tag {
        Some(kind) => kind.cast(value),
        None => value.clone(),
    }
}

fn cast_string(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(text) => Value::String(text.clone()),
        Value::Bool(true) => Value::from("t"),
        Value::Bool(false) => Value::from("f"),
        Value::Integer(number) => Value::String(number.to_string()),
        Value::Float(number) => Value::String(format_float(*number)),
        Value::Map(_) => Value::String(serde_json::to_string(value).unwrap_or_default()),
    }
}

fn cast_integer(value: &Value) -> Value {
    match value {
        Value::Null | Value::Map(_) => Value::Null,
        Value::Bool(flag) => Value::Integer(i64::from(*flag)),
        Value::Integer(number) => Value::Integer(*number),
        Value::Float(number) if number.is_finite() => Value::Integer(number.trunc() as i64),
        Value::Float(_) => Value::Null,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            Value::Integer(parse_integer_prefix(trimmed))
        }
    }
}

fn cast_float(value: &Value) -> Value {
    match value {
        Value::Null | Value::Map(_) => Value::Null,
        Value::Bool(flag) => Value::Float(if *flag { 1.0 } else { 0.0 }),
        Value::Integer(number) => Value::Float(*number as f64),
        Value::Float(number) => Value::Float(*number),
        Value::String(text) => {
            let trimmed = text.trim();
            match trimmed {
                "" => Value::Null,
                "NaN" => Value::Float(f64::NAN),
                "Infinity" => Value::Float(f64::INFINITY),
                "-Infinity" => Value::Float(f64::NEG_INFINITY),
                other => Value::Float(parse_float_prefix(other)),
            }
        }
    }
}

fn cast_boolean(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(flag) => Value::Bool(*flag),
        Value::Integer(number) => Value::Bool(*number != 0),
        Value::Float(number) => Value::Bool(*number != 0.0),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            let lowered = trimmed.to_ascii_lowercase();
            Value::Bool(!FALSE_WORDS.contains(&lowered.as_str()))
        }
        Value::Map(_) => Value::Bool(true),
    }
}

fn cast_date(value: &Value) -> Value {
    let Value::String(text) = value else {
        return Value::Null;
    };
    let trimmed = text.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|parsed| parsed.date_naive())
        })
        .map_or(Value::Null, Value::from)
}

fn cast_datetime(value: &Value) -> Value {
    match value {
        Value::Integer(seconds) => DateTime::<Utc>::from_timestamp(*seconds, 0)
            .map_or(Value::Null, Value::from),
        Value::String(text) => {
            let trimmed = text.trim();
            DateTime::parse_from_rfc3339(trimmed)
                .map(|parsed| parsed.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                        .iter()
                        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                        .map(|naive| naive.and_utc())
                })
                .map_or(Value::Null, Value::from)
        }
        _ => Value::Null,
    }
}

fn parse_integer_prefix(text: &str) -> i64 {
    let Some(found) = INTEGER_PREFIX_RE.find(text) else {
        return 0;
    };
    let digits = found.as_str();
    let (negative, digits) = match digits.as_bytes()[0] {
        b'-' => (true, &digits[1..]),
        b'+' => (false, &digits[1..]),
        _ => (false, digits),
    };

    let mut total: i64 = 0;
    for digit in digits.bytes() {
        let digit = i64::from(digit - b'0');
        total = total
            .saturating_mul(10)
            .saturating_add(if negative { -digit } else { digit });
    }
    total
}

fn parse_float_prefix(text: &str) -> f64 {
    FLOAT_PREFIX_RE
        .find(text)
        .and_then(|found| found.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn format_float(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e16 {
        format!("{number:.1}")
    } else {
        number.to_string()
    }
}

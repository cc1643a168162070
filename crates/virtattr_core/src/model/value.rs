//! Storage value stored inside backing containers.
//!
//! # Responsibility
//! - Define the closed set of values a backing container may hold.
//! - Define the presence rule used by the non-boolean read path.
//!
//! # Invariants
//! - Serialized form is plain JSON (untagged), so a container round-trips
//!   through the serialized backing field unchanged.
//! - `Null`, `false`, zero numbers, empty strings and empty maps are blank.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// One backing container: string keys to storage values.
pub type Container = BTreeMap<String, Value>;

/// Storage-safe value held by a backing container or a real column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns whether this value counts as "set" for default fallback.
    ///
    /// Blank values (`Null`, `false`, `0`, `0.0`, `""`, `{}`) are treated the
    /// same as a missing key: readers fall back to the declared default.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Integer(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::String(value) => !value.is_empty(),
            Self::Map(value) => !value.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(value) => Some(value),
            _ => None,
        }
    }

    /// Reads a `YYYY-MM-DD` string as a calendar date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_str()
            .and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value}"),
            Self::Map(_) => match serde_json::to_string(self) {
                Ok(json) => write!(f, "{json}"),
                Err(_) => write!(f, "{{..}}"),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::String(value.format("%Y-%m-%d").to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::String(value.to_rfc3339())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::{Container, Value};

    #[test]
    fn blank_values_are_not_present() {
        for blank in [
            Value::Null,
            Value::Bool(false),
            Value::Integer(0),
            Value::Float(0.0),
            Value::String(String::new()),
            Value::Map(Container::new()),
        ] {
            assert!(!blank.is_present(), "{blank} should be blank");
        }
        assert!(Value::from("x").is_present());
        assert!(Value::from(-1).is_present());
        assert!(Value::from(true).is_present());
    }

    #[test]
    fn container_serializes_as_plain_json_object() {
        let mut container = Container::new();
        container.insert("greeting".to_string(), Value::from("Hi"));
        container.insert("counter".to_string(), Value::from(3));
        container.insert("ratio".to_string(), Value::from(0.5));
        container.insert("friendly".to_string(), Value::from(false));
        container.insert("missing".to_string(), Value::Null);

        let json = serde_json::to_string(&container).unwrap();
        assert_eq!(
            json,
            r#"{"counter":3,"friendly":false,"greeting":"Hi","missing":null,"ratio":0.5}"#
        );

        let decoded: Container = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, container);
    }

    #[test]
    fn display_prints_scalars_bare() {
        assert_eq!(Value::from("Hi there").to_string(), "Hi there");
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
        let mut map = Container::new();
        map.insert("k".to_string(), Value::from("v"));
        assert_eq!(Value::Map(map).to_string(), r#"{"k":"v"}"#);
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(7)), Value::Integer(7));
    }
}

//! Validation failure collection.
//!
//! # Responsibility
//! - Collect named validation failures produced by a record's validators.
//!
//! # Invariants
//! - Failures keep insertion order.
//! - A record with an empty collection is valid for persistence.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Kind of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// Generic "is invalid" failure.
    Invalid,
}

impl ValidationErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            Self::Invalid => "is invalid",
        }
    }
}

/// One failure attributed to an attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidationFailure {
    attribute: String,
    kind: ValidationErrorKind,
}

/// Ordered failures recorded by the last validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    pub fn add(&mut self, attribute: impl Into<String>, kind: ValidationErrorKind) {
        self.failures.push(ValidationFailure {
            attribute: attribute.into(),
            kind,
        });
    }

    /// Returns whether any failure is attributed to `attribute`.
    pub fn include(&self, attribute: &str) -> bool {
        self.failures
            .iter()
            .any(|failure| failure.attribute == attribute)
    }

    /// Failure kinds attributed to `attribute`.
    pub fn on(&self, attribute: &str) -> Vec<ValidationErrorKind> {
        self.failures
            .iter()
            .filter(|failure| failure.attribute == attribute)
            .map(|failure| failure.kind)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Human-readable messages such as `thing is invalid`.
    pub fn full_messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|failure| format!("{} {}", failure.attribute, failure.kind.message()))
            .collect()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed: {}", self.full_messages().join(", "))
    }
}

impl Error for ValidationErrors {}

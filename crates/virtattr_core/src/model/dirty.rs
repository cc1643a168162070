//! Per-record change tracking.
//!
//! # Responsibility
//! - Record which attribute names were mutated since the last save.
//! - Keep the changes applied by the most recent save.
//!
//! # Invariants
//! - The original value of an attribute is captured by the first
//!   `mark_changed` call after a save and never overwritten until the next
//!   `changes_applied`.
//! - Virtual attributes and real columns share one name space.

use crate::model::value::Value;
use std::collections::BTreeMap;

/// Mutated-attributes set owned by one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTracker {
    pending: BTreeMap<String, Value>,
    saved: BTreeMap<String, (Value, Value)>,
}

impl ChangeTracker {
    /// Marks `name` as changed, remembering `original` on first mark.
    pub fn mark_changed(&mut self, name: &str, original: Value) {
        self.pending.entry(name.to_string()).or_insert(original);
    }

    pub fn was_changed(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Changed names in sorted order.
    pub fn changed(&self) -> Vec<String> {
        self.pending.keys().cloned().collect()
    }

    /// Value each changed attribute had before it was first marked.
    pub fn original(&self, name: &str) -> Option<&Value> {
        self.pending.get(name)
    }

    /// Moves pending changes into the saved snapshot.
    ///
    /// `current` reads the post-save value of each changed attribute.
    pub fn changes_applied(&mut self, mut current: impl FnMut(&str) -> Value) {
        let pending = std::mem::take(&mut self.pending);
        self.saved = pending
            .into_iter()
            .map(|(name, original)| {
                let now = current(&name);
                (name, (original, now))
            })
            .collect();
    }

    pub fn saved_change_to(&self, name: &str) -> bool {
        self.saved.contains_key(name)
    }

    /// `(before, after)` pairs persisted by the last save.
    pub fn previous_changes(&self) -> &BTreeMap<String, (Value, Value)> {
        &self.saved
    }
}

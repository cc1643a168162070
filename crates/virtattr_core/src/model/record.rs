//! Record instances and the virtual attribute overlay.
//!
//! # Responsibility
//! - Own the real columns and backing containers of one record.
//! - Read/write virtual attributes through their declared coercion and
//!   default.
//! - Read/write model references as prefixed global ids.
//! - Track changes and run the schema's validators.
//!
//! # Invariants
//! - A virtual attribute lives under its own name inside its backing
//!   container.
//! - Writes mark the attribute changed before the value is stored, so the
//!   captured original is the pre-write value.
//! - Non-boolean reads treat blank values (`0`, `""`, ...) as unset and
//!   return the default; this matches data already stored by earlier
//!   writers and must not be "fixed".
//! - Reading a dangling reference yields `None`, never an error.

use crate::global_id::{GlobalId, Identification, Locator};
use crate::model::attribute::cast_with;
use crate::model::dirty::ChangeTracker;
use crate::model::schema::{AttributeDecl, ReferenceDecl, Schema, MODEL_ID_PREFIX};
use crate::model::validation::ValidationErrors;
use crate::model::value::{Container, Value};
use crate::repo::record_repo::RepoResult;
use log::warn;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Stable identifier assigned to a record on first save.
pub type RecordId = Uuid;

/// Misuse of a record's declared surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    /// Name is neither a declared column nor a virtual attribute.
    UnknownAttribute { model: String, name: String },
    /// Name is not a declared model reference.
    UnknownReference { model: String, name: String },
    /// Predicate read on a non-boolean attribute.
    NotBoolean(String),
    /// Reference target has no global id yet (never saved).
    UnpersistedReference(String),
}

impl Display for AttributeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute { model, name } => {
                write!(f, "unknown attribute `{name}` for {model}")
            }
            Self::UnknownReference { model, name } => {
                write!(f, "unknown model reference `{name}` for {model}")
            }
            Self::NotBoolean(name) => write!(f, "attribute `{name}` is not boolean"),
            Self::UnpersistedReference(name) => {
                write!(f, "cannot reference an unsaved record through `{name}`")
            }
        }
    }
}

impl Error for AttributeError {}

/// One record with its columns, backing containers and change state.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    id: Option<RecordId>,
    columns: BTreeMap<String, Value>,
    fields: BTreeMap<String, Container>,
    changes: ChangeTracker,
    errors: ValidationErrors,
}

impl Record {
    /// Creates an unsaved record with empty columns and containers.
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self::from_storage(schema, None, BTreeMap::new(), BTreeMap::new())
    }

    /// Rebuilds a record from stored state; undeclared keys are kept.
    pub(crate) fn from_storage(
        schema: &Arc<Schema>,
        id: Option<RecordId>,
        mut columns: BTreeMap<String, Value>,
        mut fields: BTreeMap<String, Container>,
    ) -> Self {
        for column in schema.columns() {
            columns.entry(column.to_string()).or_default();
        }
        for field in schema.fields() {
            fields.entry(field.to_string()).or_default();
        }
        Self {
            schema: Arc::clone(schema),
            id,
            columns,
            fields,
            changes: ChangeTracker::default(),
            errors: ValidationErrors::default(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn model_name(&self) -> &str {
        self.schema.model_name()
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> &BTreeMap<String, Value> {
        &self.columns
    }

    /// Writes a real column, tracked like a virtual attribute.
    pub fn set_column(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), AttributeError> {
        if !self.schema.has_column(name) {
            return Err(self.unknown_attribute(name));
        }
        let original = self.columns.get(name).cloned().unwrap_or_default();
        self.changes.mark_changed(name, original);
        self.columns.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Backing container stored under `field`.
    pub fn container(&self, field: &str) -> Option<&Container> {
        self.fields.get(field)
    }

    pub fn containers(&self) -> &BTreeMap<String, Container> {
        &self.fields
    }

    /// Reads a virtual attribute: coerced stored value, or its default.
    ///
    /// Boolean attributes fall back only when the coerced value is not a
    /// boolean. Other attributes also fall back on blank values, so a stored
    /// `0` or `""` reads as the default.
    pub fn read_attribute(&self, name: &str) -> Result<Value, AttributeError> {
        let declaration = self.attribute_decl(name)?;
        Ok(self.read_declared(declaration))
    }

    /// Predicate form of a boolean attribute read.
    pub fn query_attribute(&self, name: &str) -> Result<Option<bool>, AttributeError> {
        let declaration = self.attribute_decl(name)?;
        if !declaration.is_boolean() {
            return Err(AttributeError::NotBoolean(name.to_string()));
        }
        Ok(self.read_declared(declaration).as_bool())
    }

    /// Coerces and stores a virtual attribute, marking it changed first.
    pub fn write_attribute(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), AttributeError> {
        let declaration = self.attribute_decl(name)?.clone();
        let original = self.read_declared(&declaration);
        self.changes.mark_changed(name, original);

        let coerced = cast_with(declaration.type_tag, &value.into());
        self.fields
            .entry(declaration.field)
            .or_default()
            .insert(declaration.name, coerced);
        Ok(())
    }

    /// Assigns a column or virtual attribute by name.
    pub fn assign(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), AttributeError> {
        if self.schema.has_column(name) {
            self.set_column(name, value)
        } else {
            self.write_attribute(name, value)
        }
    }

    /// Assigns several columns or attributes in order.
    pub fn assign_all<I, K, V>(&mut self, assignments: I) -> Result<(), AttributeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in assignments {
            self.assign(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Raw encoded id stored for reference `name` (prefix included).
    pub fn reference_id(&self, name: &str) -> Result<Option<String>, AttributeError> {
        let reference = self.reference_decl(name)?;
        let raw = self.read_attribute(&reference.id_attribute)?;
        Ok(raw.as_str().map(str::to_string))
    }

    /// Stores `target` as a prefixed global id, or clears the reference.
    pub fn write_reference(
        &mut self,
        name: &str,
        target: Option<&Record>,
    ) -> Result<(), AttributeError> {
        let id_attribute = self.reference_decl(name)?.id_attribute.clone();
        let encoded = match target {
            None => Value::Null,
            Some(target) => {
                let global_id = target
                    .to_global_id()
                    .ok_or_else(|| AttributeError::UnpersistedReference(name.to_string()))?;
                Value::String(format!("{MODEL_ID_PREFIX}{global_id}"))
            }
        };
        self.write_attribute(&id_attribute, encoded)
    }

    /// Resolves reference `name` through `locator`.
    ///
    /// Returns `Ok(None)` when nothing is stored, when the stored id is
    /// malformed, or when the referenced record no longer exists.
    pub fn read_reference(&self, name: &str, locator: &dyn Locator) -> RepoResult<Option<Record>> {
        let Some(stored) = self.reference_id(name)? else {
            return Ok(None);
        };
        if stored.is_empty() {
            return Ok(None);
        }

        let unwrapped = stored.strip_prefix(MODEL_ID_PREFIX).unwrap_or(&stored);
        let Some(global_id) = GlobalId::parse(unwrapped) else {
            warn!(
                "event=reference_resolve module=record status=malformed model={} reference={}",
                self.model_name(),
                name
            );
            return Ok(None);
        };

        let resolved = locator.locate(&global_id)?.into_option();
        if resolved.is_none() {
            warn!(
                "event=reference_resolve module=record status=not_found model={} reference={} target_model={}",
                self.model_name(),
                name,
                global_id.model_name
            );
        }
        Ok(resolved)
    }

    /// Forces `name` into the changed set without writing it.
    pub fn mark_changed(&mut self, name: &str) -> Result<(), AttributeError> {
        let current = self.current_value(name)?;
        self.changes.mark_changed(name, current);
        Ok(())
    }

    pub fn attribute_changed(&self, name: &str) -> bool {
        self.changes.was_changed(name)
    }

    pub fn has_changes(&self) -> bool {
        self.changes.is_dirty()
    }

    pub fn changed_attributes(&self) -> Vec<String> {
        self.changes.changed()
    }

    /// `(original, current)` for every unsaved change.
    pub fn changes(&self) -> BTreeMap<String, (Value, Value)> {
        self.changes
            .changed()
            .into_iter()
            .map(|name| {
                let original = self.changes.original(&name).cloned().unwrap_or_default();
                let current = self.current_value(&name).unwrap_or_default();
                (name, (original, current))
            })
            .collect()
    }

    pub fn saved_change_to_attribute(&self, name: &str) -> bool {
        self.changes.saved_change_to(name)
    }

    pub fn previous_changes(&self) -> &BTreeMap<String, (Value, Value)> {
        self.changes.previous_changes()
    }

    /// Runs every schema validator, replacing `errors()`.
    ///
    /// Only lookup failures from `locator` are returned as errors.
    pub fn validate(&mut self, locator: &dyn Locator) -> RepoResult<bool> {
        let schema = Arc::clone(&self.schema);
        let mut errors = ValidationErrors::default();
        for validator in schema.validators() {
            validator.run(self, locator, &mut errors)?;
        }
        self.errors = errors;
        Ok(self.errors.is_empty())
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub(crate) fn assign_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub(crate) fn changes_applied(&mut self) {
        let mut tracker = std::mem::take(&mut self.changes);
        tracker.changes_applied(|name| self.current_value(name).unwrap_or_default());
        self.changes = tracker;
    }

    fn current_value(&self, name: &str) -> Result<Value, AttributeError> {
        if let Some(value) = self.columns.get(name) {
            return Ok(value.clone());
        }
        self.read_attribute(name)
    }

    fn read_declared(&self, declaration: &AttributeDecl) -> Value {
        let missing = Value::Null;
        let raw = self
            .fields
            .get(&declaration.field)
            .and_then(|container| container.get(&declaration.name))
            .unwrap_or(&missing);
        let coerced = cast_with(declaration.type_tag, raw);

        let keep = if declaration.is_boolean() {
            matches!(coerced, Value::Bool(_))
        } else {
            coerced.is_present()
        };
        if keep {
            coerced
        } else {
            declaration.default.clone()
        }
    }

    fn attribute_decl(&self, name: &str) -> Result<&AttributeDecl, AttributeError> {
        self.schema
            .attribute(name)
            .ok_or_else(|| self.unknown_attribute(name))
    }

    fn reference_decl(&self, name: &str) -> Result<&ReferenceDecl, AttributeError> {
        self.schema
            .reference(name)
            .ok_or_else(|| AttributeError::UnknownReference {
                model: self.model_name().to_string(),
                name: name.to_string(),
            })
    }

    fn unknown_attribute(&self, name: &str) -> AttributeError {
        AttributeError::UnknownAttribute {
            model: self.model_name().to_string(),
            name: name.to_string(),
        }
    }
}

impl Identification for Record {
    fn to_global_id(&self) -> Option<GlobalId> {
        self.id.map(|id| GlobalId::new(self.model_name(), id.to_string()))
    }
}

/// Persisted records are equal when model and id match.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id.is_some() && self.id == other.id && self.model_name() == other.model_name()
    }
}

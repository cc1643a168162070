//! Declarative record schemas.
//!
//! # Responsibility
//! - Declare real columns, virtual attributes and model references for one
//!   record type.
//! - Hold the validator list run by `Record::validate`.
//! - Track the type lineage used for descendant-inclusive type checks.
//!
//! # Invariants
//! - Attribute names are unique per schema; redeclaring a name replaces the
//!   earlier declaration without error.
//! - A model reference `x` always owns an untyped attribute `x_id`.
//! - `lineage()[0]` is the schema's own model name; the last entry is the
//!   root model that shares storage with all descendants.
//! - Model names and reference targets always fit the model segment of a
//!   global id, so every saved record can be referenced and resolved.

use crate::global_id::{self, Locator};
use crate::model::attribute::AttributeType;
use crate::model::record::Record;
use crate::model::validation::{ValidationErrorKind, ValidationErrors};
use crate::model::value::Value;
use crate::repo::record_repo::RepoResult;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Backing field used when a declaration does not name one.
pub const DEFAULT_FIELD: &str = "data";

/// Marks a container string as a wrapped global id.
pub const MODEL_ID_PREFIX: &str = "modelid-";

/// Definition-time schema error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The model name cannot be embedded in a global id.
    InvalidModelName(String),
    /// A typed reference names a model that no global id can carry.
    InvalidReferenceTarget {
        model: String,
        reference: String,
        target: String,
    },
    /// An attribute or reference was declared with an empty name.
    EmptyName { model: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidModelName(name) => write!(
                f,
                "invalid model name `{name}`; expected a letter followed by letters, digits, `_` or `:`"
            ),
            Self::InvalidReferenceTarget {
                model,
                reference,
                target,
            } => write!(f, "{model}.{reference} references invalid model name `{target}`"),
            Self::EmptyName { model } => {
                write!(f, "{model} declares an attribute with an empty name")
            }
        }
    }
}

impl Error for SchemaError {}

/// Declaration options shared by attributes and model references.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeOptions {
    pub field: String,
    pub default: Value,
}

impl Default for AttributeOptions {
    fn default() -> Self {
        Self {
            field: DEFAULT_FIELD.to_string(),
            default: Value::Null,
        }
    }
}

impl AttributeOptions {
    /// Stores the attribute in `field` instead of `DEFAULT_FIELD`.
    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }
}

/// One virtual attribute stored in a backing container.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    pub name: String,
    /// `None` stores and returns values without coercion.
    pub type_tag: Option<AttributeType>,
    pub field: String,
    pub default: Value,
}

impl AttributeDecl {
    pub fn is_boolean(&self) -> bool {
        self.type_tag == Some(AttributeType::Boolean)
    }
}

/// A reference to another record stored as a prefixed global id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDecl {
    pub name: String,
    /// Model the resolved record must be a kind of.
    pub target_type: Option<String>,
    pub id_attribute: String,
}

/// Validator body: inspects a record and appends failures.
pub type ValidateFn =
    Arc<dyn Fn(&Record, &dyn Locator, &mut ValidationErrors) -> RepoResult<()> + Send + Sync>;

/// Named validation rule attached to a schema.
#[derive(Clone)]
pub struct Validator {
    name: String,
    run: ValidateFn,
}

impl Validator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(
        &self,
        record: &Record,
        locator: &dyn Locator,
        errors: &mut ValidationErrors,
    ) -> RepoResult<()> {
        (self.run)(record, locator, errors)
    }
}

impl Debug for Validator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").field("name", &self.name).finish()
    }
}

/// Compiled description of one record type.
#[derive(Debug, Clone)]
pub struct Schema {
    model_name: String,
    lineage: Vec<String>,
    columns: BTreeSet<String>,
    attributes: BTreeMap<String, AttributeDecl>,
    references: BTreeMap<String, ReferenceDecl>,
    validators: Vec<Validator>,
}

impl Schema {
    pub fn builder(model_name: impl Into<String>) -> SchemaBuilder {
        let model_name = model_name.into();
        SchemaBuilder {
            schema: Self {
                lineage: vec![model_name.clone()],
                model_name,
                columns: BTreeSet::new(),
                attributes: BTreeMap::new(),
                references: BTreeMap::new(),
                validators: Vec::new(),
            },
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Root model sharing storage with this schema.
    pub fn base_model(&self) -> &str {
        self.lineage
            .last()
            .map_or(self.model_name.as_str(), String::as_str)
    }

    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Descendant-inclusive type check.
    pub fn is_kind_of(&self, model_name: &str) -> bool {
        self.lineage.iter().any(|ancestor| ancestor == model_name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDecl> {
        self.attributes.values()
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceDecl> {
        self.references.get(name)
    }

    pub fn references(&self) -> impl Iterator<Item = &ReferenceDecl> {
        self.references.values()
    }

    /// Distinct backing field names used by declared attributes.
    pub fn fields(&self) -> BTreeSet<&str> {
        self.attributes
            .values()
            .map(|attribute| attribute.field.as_str())
            .collect()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }
}

/// Definition-time builder for `Schema`.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Makes this schema a descendant of `parent`.
    ///
    /// Parent columns, attributes, references and validators are inherited;
    /// declarations already made on this builder win over the parent's.
    pub fn inherits(mut self, parent: &Schema) -> Self {
        let schema = &mut self.schema;
        schema.lineage.truncate(1);
        schema.lineage.extend(parent.lineage.iter().cloned());
        schema.columns.extend(parent.columns.iter().cloned());
        for (name, attribute) in &parent.attributes {
            schema
                .attributes
                .entry(name.clone())
                .or_insert_with(|| attribute.clone());
        }
        for (name, reference) in &parent.references {
            schema
                .references
                .entry(name.clone())
                .or_insert_with(|| reference.clone());
        }
        let own = std::mem::take(&mut schema.validators);
        let mut validators: Vec<Validator> = parent
            .validators
            .iter()
            .filter(|inherited| own.iter().all(|mine| mine.name != inherited.name))
            .cloned()
            .collect();
        validators.extend(own);
        schema.validators = validators;
        self
    }

    /// Declares a real column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.schema.columns.insert(name.into());
        self
    }

    /// Declares a virtual attribute stored in `options.field`.
    pub fn has_attribute(
        mut self,
        name: impl Into<String>,
        type_tag: impl Into<Option<AttributeType>>,
        options: AttributeOptions,
    ) -> Self {
        let name = name.into();
        let declaration = AttributeDecl {
            name: name.clone(),
            type_tag: type_tag.into(),
            field: options.field,
            default: options.default,
        };

        debug!(
            "event=attribute_declared module=schema model={} attribute={} type={} field={}",
            self.schema.model_name,
            name,
            declaration.type_tag.map_or("none", AttributeType::as_str),
            declaration.field
        );
        if let Some(previous) = self.schema.attributes.insert(name.clone(), declaration) {
            debug!(
                "event=attribute_redeclared module=schema model={} attribute={} previous_field={}",
                self.schema.model_name, name, previous.field
            );
        }
        self
    }

    /// Declares a reference to another record, stored as a global id in an
    /// untyped `<name>_id` attribute.
    ///
    /// With a `target_type`, a `<name>_class_name` validator is added that
    /// rejects resolved records which are not a kind of that model.
    pub fn has_model(
        mut self,
        name: impl Into<String>,
        target_type: Option<&str>,
        options: AttributeOptions,
    ) -> Self {
        let name = name.into();
        let id_attribute = format!("{name}_id");
        self = self.has_attribute(id_attribute.clone(), None, options);

        let validator_name = format!("{name}_class_name");
        self.schema
            .validators
            .retain(|validator| validator.name != validator_name);
        if let Some(target) = target_type {
            self.schema.validators.push(Validator {
                name: validator_name,
                run: reference_type_validator(name.clone(), target.to_string()),
            });
        }

        self.schema.references.insert(
            name.clone(),
            ReferenceDecl {
                name,
                target_type: target_type.map(str::to_string),
                id_attribute,
            },
        );
        self
    }

    /// Registers a custom validator; a validator with the same name is
    /// replaced.
    pub fn validate<F>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Record, &dyn Locator, &mut ValidationErrors) -> RepoResult<()>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        self.schema
            .validators
            .retain(|validator| validator.name != name);
        self.schema.validators.push(Validator {
            name,
            run: Arc::new(run),
        });
        self
    }

    /// Checks names and freezes the schema.
    ///
    /// # Errors
    /// - The model name or a reference target does not fit a global id.
    /// - An attribute or reference name is empty.
    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        let schema = self.schema;
        if !global_id::is_valid_model_name(&schema.model_name) {
            return Err(SchemaError::InvalidModelName(schema.model_name));
        }
        let empty_name = schema.attributes.keys().any(String::is_empty)
            || schema.references.keys().any(String::is_empty);
        if empty_name {
            return Err(SchemaError::EmptyName {
                model: schema.model_name,
            });
        }
        if let Some(reference) = schema.references.values().find(|reference| {
            reference
                .target_type
                .as_deref()
                .is_some_and(|target| !global_id::is_valid_model_name(target))
        }) {
            return Err(SchemaError::InvalidReferenceTarget {
                model: schema.model_name.clone(),
                reference: reference.name.clone(),
                target: reference.target_type.clone().unwrap_or_default(),
            });
        }
        Ok(Arc::new(schema))
    }
}

fn reference_type_validator(reference: String, target: String) -> ValidateFn {
    Arc::new(
        move |record: &Record, locator: &dyn Locator, errors: &mut ValidationErrors| {
            let Some(resolved) = record.read_reference(&reference, locator)? else {
                return Ok(());
            };
            if !resolved.schema().is_kind_of(&target) {
                errors.add(reference.as_str(), ValidationErrorKind::Invalid);
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::{AttributeOptions, Schema, SchemaError, DEFAULT_FIELD};
    use crate::model::attribute::AttributeType;
    use crate::model::value::Value;

    #[test]
    fn has_attribute_defaults_to_data_field() {
        let schema = Schema::builder("Item")
            .has_attribute(
                "greeting",
                AttributeType::String,
                AttributeOptions::default().with_default("Hello"),
            )
            .build()
            .unwrap();

        let greeting = schema.attribute("greeting").expect("declared");
        assert_eq!(greeting.field, DEFAULT_FIELD);
        assert_eq!(greeting.default, Value::from("Hello"));
        assert_eq!(greeting.type_tag, Some(AttributeType::String));
        assert!(!greeting.is_boolean());
    }

    #[test]
    fn redeclaring_an_attribute_replaces_it() {
        let schema = Schema::builder("Item")
            .has_attribute("counter", AttributeType::Integer, AttributeOptions::default())
            .has_attribute(
                "counter",
                AttributeType::Float,
                AttributeOptions::default().in_field("meta_data"),
            )
            .build()
            .unwrap();

        let counter = schema.attribute("counter").expect("declared");
        assert_eq!(counter.type_tag, Some(AttributeType::Float));
        assert_eq!(counter.field, "meta_data");
        assert_eq!(schema.attributes().count(), 1);
    }

    #[test]
    fn has_model_declares_untyped_id_attribute_and_validator() {
        let schema = Schema::builder("Item")
            .has_model("thing", Some("Thing"), AttributeOptions::default())
            .has_model("owner", None, AttributeOptions::default())
            .build()
            .unwrap();

        let thing_id = schema.attribute("thing_id").expect("id attribute");
        assert_eq!(thing_id.type_tag, None);
        assert_eq!(
            schema.reference("thing").map(|reference| reference.id_attribute.as_str()),
            Some("thing_id")
        );
        let names: Vec<&str> = schema.validators().iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["thing_class_name"]);
    }

    #[test]
    fn inherited_schema_extends_lineage() {
        let thing = Schema::builder("Thing")
            .column("name")
            .has_attribute("size", AttributeType::Integer, AttributeOptions::default())
            .build()
            .unwrap();
        let sub_thing = Schema::builder("SubThing").inherits(&thing).build().unwrap();

        assert_eq!(sub_thing.lineage(), ["SubThing", "Thing"]);
        assert_eq!(sub_thing.base_model(), "Thing");
        assert!(sub_thing.is_kind_of("Thing"));
        assert!(sub_thing.is_kind_of("SubThing"));
        assert!(!thing.is_kind_of("SubThing"));
        assert!(sub_thing.has_column("name"));
        assert!(sub_thing.attribute("size").is_some());
    }

    #[test]
    fn build_rejects_names_a_global_id_cannot_carry() {
        let error = Schema::builder("line-item").build().unwrap_err();
        assert_eq!(error, SchemaError::InvalidModelName("line-item".to_string()));
        assert!(Schema::builder("Line Item").build().is_err());

        let error = Schema::builder("Item")
            .has_model("thing", Some("Some Thing"), AttributeOptions::default())
            .build()
            .unwrap_err();
        assert_eq!(
            error,
            SchemaError::InvalidReferenceTarget {
                model: "Item".to_string(),
                reference: "thing".to_string(),
                target: "Some Thing".to_string(),
            }
        );

        let error = Schema::builder("Item")
            .has_attribute("", AttributeType::String, AttributeOptions::default())
            .build()
            .unwrap_err();
        assert_eq!(
            error,
            SchemaError::EmptyName {
                model: "Item".to_string()
            }
        );
    }

    #[test]
    fn namespaced_model_names_build() {
        let schema = Schema::builder("Admin::LineItem").build().unwrap();
        assert_eq!(schema.model_name(), "Admin::LineItem");
    }
}

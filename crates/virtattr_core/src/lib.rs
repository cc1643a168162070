//! Virtual typed attributes stored inside schema-less record fields.
//!
//! Records declare typed attributes that live in a serialized backing
//! container (by default the `data` field) and references to other records
//! stored as prefixed global ids. Both read and write like real columns and
//! take part in the record's change tracking and validation.

pub mod db;
pub mod global_id;
pub mod logging;
pub mod model;
pub mod repo;

pub use global_id::{configure_app, GlobalId, Identification, Locator, Resolution};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attribute::AttributeType;
pub use model::record::{AttributeError, Record, RecordId};
pub use model::schema::{
    AttributeOptions, Schema, SchemaBuilder, SchemaError, DEFAULT_FIELD, MODEL_ID_PREFIX,
};
pub use model::validation::{ValidationErrorKind, ValidationErrors};
pub use model::value::{Container, Value};
pub use repo::record_repo::{
    RecordRepository, RepoError, RepoResult, SchemaRegistry, SqliteRecordRepository,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist records: real columns as one JSON object, each backing
//!   container as its own serialized field row.
//! - Load records back into their registered schema.
//! - Resolve global ids (`Locator`) against stored records.
//!
//! # Invariants
//! - `save` runs the record's validators first and refuses invalid records.
//! - A successful `save` applies the record's pending changes.
//! - Read paths reject undecodable payloads instead of masking them.

use crate::db::DbError;
use crate::global_id::{self, GlobalId, Locator, Resolution};
use crate::model::record::{AttributeError, Record, RecordId};
use crate::model::schema::Schema;
use crate::model::validation::ValidationErrors;
use crate::model::value::{Container, Value};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and lookup.
#[derive(Debug)]
pub enum RepoError {
    /// The record failed validation; nothing was written.
    Validation(ValidationErrors),
    Attribute(AttributeError),
    Db(DbError),
    Codec(serde_json::Error),
    NotFound(RecordId),
    UnknownModel(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "{errors}"),
            Self::Attribute(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "backing field codec failed: {err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::UnknownModel(model) => write!(f, "model `{model}` is not registered"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Attribute(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::NotFound(_)
            | Self::UnknownModel(_)
            | Self::InvalidData(_)
            | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<AttributeError> for RepoError {
    fn from(value: AttributeError) -> Self {
        Self::Attribute(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

/// Model name to schema lookup used when loading rows.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `schema`, replacing a schema registered under the same name.
    pub fn register(mut self, schema: &Arc<Schema>) -> Self {
        self.schemas
            .insert(schema.model_name().to_string(), Arc::clone(schema));
        self
    }

    pub fn get(&self, model_name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(model_name)
    }

    fn require(&self, model_name: &str) -> RepoResult<&Arc<Schema>> {
        self.get(model_name)
            .ok_or_else(|| RepoError::UnknownModel(model_name.to_string()))
    }
}

/// Repository interface for record persistence.
pub trait RecordRepository: Locator {
    /// Validates and stores `record`, assigning an id on first save.
    fn save(&self, record: &mut Record) -> RepoResult<RecordId>;
    fn find(&self, id: RecordId) -> RepoResult<Option<Record>>;
    /// Records of `model` and its descendants, in insertion order.
    fn list(&self, model: &str) -> RepoResult<Vec<Record>>;
    fn delete(&self, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
    registry: SchemaRegistry,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Creates a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection, registry: SchemaRegistry) -> RepoResult<Self> {
        for table in ["records", "record_fields"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn, registry })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn load(&self, id: RecordId, model: &str, columns_json: &str) -> RepoResult<Record> {
        let schema = self.registry.require(model)?;
        let columns: BTreeMap<String, Value> = serde_json::from_str(columns_json)
            .map_err(|err| RepoError::InvalidData(format!("records.columns for {id}: {err}")))?;

        let mut stmt = self.conn.prepare(
            "SELECT field, payload
             FROM record_fields
             WHERE record_uuid = ?1
             ORDER BY field ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut fields = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let field: String = row.get(0)?;
            let payload: String = row.get(1)?;
            let container: Container = serde_json::from_str(&payload).map_err(|err| {
                RepoError::InvalidData(format!("record_fields.{field} for {id}: {err}"))
            })?;
            fields.insert(field, container);
        }

        Ok(Record::from_storage(schema, Some(id), columns, fields))
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn save(&self, record: &mut Record) -> RepoResult<RecordId> {
        let schema = Arc::clone(self.registry.require(record.model_name())?);

        if !record.validate(self)? {
            warn!(
                "event=record_save module=repo status=invalid model={} errors={}",
                record.model_name(),
                record.errors().len()
            );
            return Err(RepoError::Validation(record.errors().clone()));
        }

        let columns_json = serde_json::to_string(record.columns())?;
        let tx = self.conn.unchecked_transaction()?;
        let id = match record.id() {
            Some(id) => {
                let changed = tx.execute(
                    "UPDATE records
                     SET
                        model = ?2,
                        base_model = ?3,
                        columns = ?4,
                        updated_at = (strftime('%s', 'now') * 1000)
                     WHERE uuid = ?1;",
                    params![
                        id.to_string(),
                        schema.model_name(),
                        schema.base_model(),
                        columns_json,
                    ],
                )?;
                if changed == 0 {
                    return Err(RepoError::NotFound(id));
                }
                id
            }
            None => {
                let id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO records (uuid, model, base_model, columns)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![
                        id.to_string(),
                        schema.model_name(),
                        schema.base_model(),
                        columns_json,
                    ],
                )?;
                id
            }
        };

        for (field, container) in record.containers() {
            tx.execute(
                "INSERT INTO record_fields (record_uuid, field, payload)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(record_uuid, field) DO UPDATE SET payload = excluded.payload;",
                params![id.to_string(), field, serde_json::to_string(container)?],
            )?;
        }
        tx.commit()?;

        record.assign_id(id);
        let changed = record.changed_attributes().len();
        record.changes_applied();
        info!(
            "event=record_save module=repo status=ok model={} changed={}",
            schema.model_name(),
            changed
        );
        Ok(id)
    }

    fn find(&self, id: RecordId) -> RepoResult<Option<Record>> {
        let row = self
            .conn
            .query_row(
                "SELECT model, columns FROM records WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((model, columns_json)) => self.load(id, &model, &columns_json).map(Some),
            None => Ok(None),
        }
    }

    fn list(&self, model: &str) -> RepoResult<Vec<Record>> {
        let schema = Arc::clone(self.registry.require(model)?);
        let mut stmt = self.conn.prepare(
            "SELECT uuid, model, columns
             FROM records
             WHERE base_model = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([schema.base_model()])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            let id = Uuid::parse_str(&uuid_text).map_err(|_| {
                RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in records.uuid"))
            })?;
            let record = self.load(id, &row.get::<_, String>(1)?, &row.get::<_, String>(2)?)?;
            if record.schema().is_kind_of(model) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn delete(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM records WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        info!("event=record_delete module=repo status=ok");
        Ok(())
    }
}

impl Locator for SqliteRecordRepository<'_> {
    fn locate(&self, gid: &GlobalId) -> RepoResult<Resolution> {
        if gid.app != global_id::app() {
            debug!(
                "event=gid_locate module=repo status=foreign_app app={}",
                gid.app
            );
            return Ok(Resolution::NotFound);
        }
        if self.registry.get(&gid.model_name).is_none() {
            return Ok(Resolution::NotFound);
        }
        let Ok(id) = Uuid::parse_str(&gid.model_id) else {
            return Ok(Resolution::NotFound);
        };

        match self.find(id) {
            Ok(Some(record)) if record.schema().is_kind_of(&gid.model_name) => {
                Ok(Resolution::Found(record))
            }
            Ok(_) => Ok(Resolution::NotFound),
            Err(RepoError::UnknownModel(stored_model)) => {
                warn!(
                    "event=gid_locate module=repo status=unregistered_model requested={} stored={}",
                    gid.model_name, stored_model
                );
                Ok(Resolution::NotFound)
            }
            Err(err) => Err(err),
        }
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

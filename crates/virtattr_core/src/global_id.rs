//! Portable global identifiers for persisted records.
//!
//! # Responsibility
//! - Encode a record as `gid://<app>/<model>/<id>` and parse it back.
//! - Hold the process-wide app name used when encoding.
//! - Define the lookup seam (`Locator`) used to resolve identifiers.
//!
//! # Invariants
//! - `GlobalId::parse` never fails loudly; malformed input yields `None`.
//! - The app name is set at most once per process.
//! - A missing entity is `Resolution::NotFound`, never an error.

use crate::model::record::Record;
use crate::repo::record_repo::RepoResult;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::fmt::{Display, Formatter};

/// App name used when none has been configured.
pub const DEFAULT_APP: &str = "virtattr";

static APP: OnceCell<String> = OnceCell::new();
static GLOBAL_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^gid://([A-Za-z0-9][A-Za-z0-9.\-]*)/([A-Za-z][A-Za-z0-9_:]*)/([^/?#\s]+)$")
        .expect("valid global id regex")
});
static APP_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.\-]*$").expect("valid app name regex"));
static MODEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_:]*$").expect("valid model name regex"));

/// Sets the app name embedded in every encoded global id.
///
/// # Errors
/// - Returns an error when `name` is not a valid URI host label.
/// - Returns an error when a different app name is already configured.
pub fn configure_app(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if !APP_NAME_RE.is_match(trimmed) {
        return Err(format!("invalid global id app name `{trimmed}`"));
    }

    let active = APP.get_or_init(|| trimmed.to_string());
    if active != trimmed {
        return Err(format!(
            "global id app already configured as `{active}`; refusing to switch to `{trimmed}`"
        ));
    }
    Ok(())
}

/// Whether `name` can be embedded as the model segment of a global id.
pub fn is_valid_model_name(name: &str) -> bool {
    MODEL_NAME_RE.is_match(name)
}

/// Returns the configured app name, or `DEFAULT_APP`.
pub fn app() -> &'static str {
    APP.get().map_or(DEFAULT_APP, String::as_str)
}

/// System-wide address of one persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalId {
    pub app: String,
    pub model_name: String,
    pub model_id: String,
}

impl GlobalId {
    /// Builds an id for the configured app.
    pub fn new(model_name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            app: app().to_string(),
            model_name: model_name.into(),
            model_id: model_id.into(),
        }
    }

    /// Parses `gid://<app>/<model>/<id>`.
    pub fn parse(value: &str) -> Option<Self> {
        let captures = GLOBAL_ID_RE.captures(value.trim())?;
        Some(Self {
            app: captures.get(1)?.as_str().to_string(),
            model_name: captures.get(2)?.as_str().to_string(),
            model_id: captures.get(3)?.as_str().to_string(),
        })
    }
}

impl Display for GlobalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "gid://{}/{}/{}", self.app, self.model_name, self.model_id)
    }
}

/// Entities that can be addressed by a global id.
pub trait Identification {
    /// Returns `None` while the entity has no persistent identity.
    fn to_global_id(&self) -> Option<GlobalId>;
}

/// Outcome of resolving a global id.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Record),
    NotFound,
}

impl Resolution {
    pub fn into_option(self) -> Option<Record> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound => None,
        }
    }
}

/// Resolves global ids back to records.
///
/// Only storage failures are errors; anything that does not address a live
/// record is `Resolution::NotFound`.
pub trait Locator {
    fn locate(&self, global_id: &GlobalId) -> RepoResult<Resolution>;
}

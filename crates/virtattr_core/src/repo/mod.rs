//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define record persistence contracts used by callers and validators.
//! - Isolate SQLite query details and the backing field codec.
//!
//! # Invariants
//! - Repository writes run `Record::validate()` before persistence.
//! - A repository is also the `Locator` for global ids it can resolve.

pub mod record_repo;

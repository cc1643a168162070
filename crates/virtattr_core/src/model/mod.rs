//! Record model and virtual attribute overlay.
//!
//! # Responsibility
//! - Describe record types declaratively (`schema`).
//! - Store virtual typed attributes inside schema-less backing containers
//!   and expose them like real columns (`record`).
//!
//! # Invariants
//! - Backing containers only ever hold `value::Value` entries.
//! - Change tracking and validation are owned by each record instance.

pub mod attribute;
pub mod dirty;
pub mod record;
pub mod schema;
pub mod validation;
pub mod value;

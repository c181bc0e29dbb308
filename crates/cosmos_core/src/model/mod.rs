//! In-memory (transport) model layer.
//!
//! # Responsibility
//! - Define the shared transport shape mirrored from persisted records.
//! - Define the input contracts used by repository writes.
//! - Define input validation applied before repository calls.
//!
//! # Invariants
//! - A model is always derivable from its record without loss for the shared
//!   identity and audit fields.
//! - External field names are the camel case form of storage names.

pub mod base;
pub mod validation;

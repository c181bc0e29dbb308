//! Repository layer: generic CRUD over storage records.
//!
//! # Responsibility
//! - Map typed create/get/update/delete/list onto session scopes.
//! - Convert storage records into in-memory models.
//! - Own the not-found error contract.
//!
//! # Invariants
//! - Every operation runs in exactly one session scope.
//! - Repositories hold no entity state between calls.

pub mod base;
pub mod error;

//! Core use-case services.
//!
//! # Responsibility
//! - Sit between routing code and repositories.
//! - Keep routing layers decoupled from storage details.

pub mod resource_service;

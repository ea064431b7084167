//! Persistence layer for the form backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - `FormStore` implementations for PostgreSQL and in-memory storage

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use memory::InMemoryFormStore;
pub use store::PgFormStore;

//! Domain layer for the form backend.
//!
//! This crate contains:
//! - Domain models (Tenant, Form, Submission, NotificationLog, settings)
//! - Plan entitlements
//! - The store and mail transport traits the service is built against
//! - Business logic services for the intake and notification pipeline
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::DomainError;

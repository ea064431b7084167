//! Shared utilities and common types for the form backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Offset-based pagination
//! - Email and settings validation
//! - Identity token verification

pub mod identity;
pub mod pagination;
pub mod validation;

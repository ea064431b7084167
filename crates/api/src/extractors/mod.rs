//! Custom Axum extractors.

pub mod tenant_auth;

pub use tenant_auth::TenantAuth;

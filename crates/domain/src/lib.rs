//! # StoreLink Domain
//!
//! Business domain types for the connector framework.
//!
//! This crate contains:
//! - Connector configuration documents and cache identity
//! - Retail and wishlist models returned by connectors
//! - Application configuration structures and defaults
//! - The `StoreLinkError` taxonomy and `Result` alias
//!
//! ## Architecture
//! - No dependencies on other StoreLink crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

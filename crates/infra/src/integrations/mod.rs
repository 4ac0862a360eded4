//! Concrete connector adapters

pub mod commerce;
pub mod static_catalog;

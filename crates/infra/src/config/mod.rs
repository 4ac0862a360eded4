//! Configuration loading
//!
//! Application configuration comes from an optional TOML/JSON file with
//! `STORELINK_*` environment overrides on top.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};

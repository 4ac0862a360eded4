//! Logging bootstrap for processes embedding StoreLink

pub mod logging;

pub use logging::{build_filter, init_logging};

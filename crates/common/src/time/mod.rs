//! Time abstractions
//!
//! Everything in this crate that reasons about elapsed time (breaker windows,
//! token expiry, idle eviction) reads it through [`Clock`] so tests can drive
//! time with [`MockClock`] instead of sleeping.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use storelink_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
//! ```

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};

//! Outbound HTTP

pub mod client;

pub use client::{status_error, HttpClient, HttpClientBuilder};

//! Inbound request normalization
//!
//! Maps caller bodies onto the schema the upstream expects

pub mod request;

pub use request::normalize;

//! Upstream backend
//!
//! Communication with the NIM chat-completions API

pub mod upstream;

pub use upstream::UpstreamClient;

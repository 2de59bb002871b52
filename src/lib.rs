//! OpenAI-compatible chat-completions proxy for the NVIDIA NIM API.

pub mod backends;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod streaming;
pub mod transform;

pub use backends::UpstreamClient;
pub use config::Config;
pub use error::{ProxyError, ProxyResult};
pub use router::build_router;

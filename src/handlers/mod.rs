//! Request handlers
//!
//! Chat completions, the static model catalog and liveness endpoints

pub mod chat;
pub mod health;
pub mod models;

pub use chat::{chat_completions_handler, chat_preflight_handler};
pub use health::{health_handler, root_handler};
pub use models::models_handler;

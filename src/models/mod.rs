//! Request and response types exchanged with callers and the upstream

pub mod catalog;
pub mod chat;

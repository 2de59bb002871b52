//! SSE relay
//!
//! Re-frames the upstream event stream for the client as it arrives

pub mod relay;

pub use relay::{relay, relay_frames, ErrorEnvelope};

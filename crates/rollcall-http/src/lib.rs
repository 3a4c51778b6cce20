//! rollcall-http — HTTP/JSON transport for the attendance service.
//!
//! Implements [`rollcall_core::Transport`] over reqwest. This is the only
//! crate in the workspace that opens network connections.

pub mod client;

pub use client::{HttpTransport, DEFAULT_TIMEOUT_SECS};

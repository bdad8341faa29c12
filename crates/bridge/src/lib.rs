//! Process bridge to the boop backend.
//!
//! Speaks newline-delimited JSON envelopes over a pair of byte streams
//! (usually the backend's stdout and stdin). Implements request-response
//! with UUID correlation and fans push events out to per-event listeners.

pub mod client;
mod pumps;
mod router;

pub use client::{BridgeClient, BridgeError};

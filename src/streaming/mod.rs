//! Streaming Module
//!
//! Incremental SSE framing and the per-call streaming session that feeds
//! decoded frames to the execution serializer.

mod frame;
pub(crate) mod session;

pub use frame::*;

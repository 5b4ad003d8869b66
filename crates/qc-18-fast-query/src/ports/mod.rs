//! # Ports Layer
//!
//! - `inbound.rs` - Query API exposed to the JSON-RPC layer
//! - `outbound.rs` - Key-value store the worker persists into

pub mod inbound;
pub mod outbound;

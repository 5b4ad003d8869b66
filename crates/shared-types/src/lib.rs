//! # Shared Types Crate
//!
//! Chain primitives shared by the fast-query subsystem and the node runtime.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every crate uses these definitions for
//!   hashes, addresses, accounts and params.
//! - **Codec Neutral**: All entities derive serde so they travel through both
//!   the binary (bincode) and the JSON codecs unchanged.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;

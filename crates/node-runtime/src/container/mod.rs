//! # Subsystem Container
//!
//! Configuration and lifetime management for the fast-query subsystem.

pub mod config;
pub mod fast_query;

pub use config::{ConfigError, NodeConfig, StorageBackend, StorageConfig};
pub use fast_query::{ContainerError, FastQueryContainer};

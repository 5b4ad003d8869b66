//! # Adapters
//!
//! Store backends for the fast-query subsystem.

pub mod storage;

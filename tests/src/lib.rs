//! # Quantum-Chain Test Suite
//!
//! Cross-crate tests for the fast-query subsystem.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── flows.rs        # Producer → worker → querier, replication
//! │   └── concurrency.rs  # Readers racing seal and drain
//! └── benches/
//!     └── fast_query_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # By category
//! cargo test -p qc-tests integration::flows
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

pub mod integration;

//! SAN Core - Shared types and traits
//!
//! This crate defines the core abstractions used across:
//! - san-simulation-engine (reliability model, redistribution, driver)
//! - san-sim (CLI)
//! - chart/editor collaborators that only read snapshots
//!
//! Key types:
//! - Node specs and load snapshots
//! - Mitigation scheme identifiers (threshold policy x selection criterion)
//! - Redistribution records and per-tick samples
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;

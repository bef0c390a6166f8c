//! # SenseRest Domain
//!
//! Domain types shared by every SenseRest crate.
//!
//! This crate contains:
//! - The error taxonomy ([`RestError`]) and Result definition
//! - Connection-mode tag, identity and session types
//! - Client settings structures
//! - Protocol constants (header, cookie and endpoint names)
//!
//! ## Architecture
//! - No dependencies on other SenseRest crates
//! - Only external dependencies allowed
//! - Pure data, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

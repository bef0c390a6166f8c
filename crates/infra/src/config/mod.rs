//! Settings loading
//!
//! Reads [`senserest_domain::ClientSettings`] from environment variables and
//! files.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_settings_paths};

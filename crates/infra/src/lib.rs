//! # SenseRest Infrastructure
//!
//! reqwest-backed implementation of the client.
//!
//! This crate contains:
//! - The connection profile and the ten connection strategies
//! - Authentication handshakes run through the core coordinator
//! - [`RestClient`] and its blocking facade
//! - Certificate loading, paging helpers and the per-user client factory
//! - The settings loader
//!
//! ## Architecture
//! - Implements the ports defined in `senserest-core`
//! - Depends on `senserest-domain` and `senserest-core`
//! - Contains all network and file I/O

pub mod api;
pub mod blocking;
pub mod certs;
pub mod config;
pub mod connection;
pub mod errors;
pub mod factory;
pub mod http;
mod paging;
pub mod profile;

pub use api::{ClientOverrides, RawContent, RestClient};
pub use blocking::BlockingRestClient;
pub use certs::CertificateSet;
pub use connection::{ConnectionStrategy, RequestCredential};
pub use errors::InfraError;
pub use factory::ClientFactory;
pub use profile::{ConnectionProfile, SessionArtifacts};

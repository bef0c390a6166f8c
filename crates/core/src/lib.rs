//! # SenseRest Core
//!
//! Authentication state machine and ports - no HTTP.
//!
//! This crate contains:
//! - The single-flight [`AuthCoordinator`]
//! - Port interfaces ([`AuthProcedure`], [`ClientObserver`])
//! - The anti-forgery key type ([`Xrfkey`])
//! - Ownership markers used by client clones
//!
//! ## Architecture Principles
//! - Only depends on `senserest-domain`
//! - Transports live in `senserest-infra` and plug in via traits
//! - Concurrency behaviour is testable without a network

pub mod auth;
pub mod ownership;
pub mod ports;
pub mod xrfkey;

pub use auth::{AuthCoordinator, AuthState};
pub use ownership::{PerClient, Shared};
pub use ports::{AuthProcedure, ClientObserver, NoopObserver, TracingObserver};
pub use xrfkey::Xrfkey;

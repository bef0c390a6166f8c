//! Single-flight authentication

mod coordinator;

pub use coordinator::{AuthCoordinator, AuthState};

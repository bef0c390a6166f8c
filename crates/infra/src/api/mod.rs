//! Client surface
//!
//! [`RestClient`] issues calls, [`ClientOverrides`] shapes derived clients and
//! [`RawContent`] carries a body with its own content type.

pub mod client;
pub mod content;
mod derive;
pub(crate) mod dispatch;

pub use client::RestClient;
pub use content::RawContent;
pub use derive::ClientOverrides;

//! Connection modes and the handshakes some of them need

mod handshake;
mod strategy;

use std::fmt;

use reqwest::RequestBuilder;
use senserest_domain::Result;
use url::Url;

pub(crate) use handshake::Handshake;
pub use strategy::ConnectionStrategy;

/// Attaches Windows-integrated credentials to outgoing requests
///
/// reqwest speaks neither NTLM nor Negotiate, so NTLM-via-proxy mode takes
/// the credential step from the caller (an SSPI or Kerberos binding, or a
/// pre-negotiated `Authorization` header).
pub trait RequestCredential: Send + Sync + fmt::Debug {
    /// Decorate `request`, which is about to be sent to `url`
    fn authorize(&self, request: RequestBuilder, url: &Url) -> Result<RequestBuilder>;
}

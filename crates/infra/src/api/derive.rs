//! Derived clients
//!
//! A derived client reuses its parent's transport settings, cookie jar and
//! certificates, but owns its headers and default arguments. It starts out
//! authenticated only when the parent already was.

use std::sync::Arc;

use senserest_core::AuthState;
use senserest_domain::constants::SECURITY_HEADER;
use senserest_domain::{Result, SecurityContext};
use tracing::debug;

use super::client::RestClient;

/// Properties a derived client replaces
#[derive(Debug, Clone, Default)]
pub struct ClientOverrides {
    pub security_context: Option<SecurityContext>,
    pub content_type: Option<String>,
    pub xrfkey: Option<String>,
    pub headers: Vec<(String, String)>,
    pub default_arguments: Vec<(String, String)>,
}

impl ClientOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn security_context(mut self, context: SecurityContext) -> Self {
        self.security_context = Some(context);
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn xrfkey(mut self, key: impl Into<String>) -> Self {
        self.xrfkey = Some(key.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Query argument added to every call, e.g. a page start or size
    #[must_use]
    pub fn default_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_arguments.push((key.into(), value.into()));
        self
    }
}

impl RestClient {
    /// Build a new client from this one with `overrides` applied
    ///
    /// The parent is left untouched. When the parent has not authenticated
    /// yet, the derived client gets fresh session artifacts and runs the
    /// same handshake on its own first call.
    ///
    /// # Errors
    ///
    /// [`senserest_domain::RestError::InvalidArgument`] for an invalid
    /// header or xrfkey override.
    pub fn derive(&self, overrides: ClientOverrides) -> Result<Self> {
        let mut profile = self.profile.clone();
        if self.auth_state() == AuthState::Authenticated {
            profile.authenticated = true;
        } else {
            profile.detach_session();
        }

        if let Some(context) = overrides.security_context {
            profile.set_header(SECURITY_HEADER, context.header_value())?;
        }
        if let Some(content_type) = overrides.content_type {
            profile.content_type = content_type;
        }
        if let Some(key) = overrides.xrfkey {
            profile.set_xrfkey(&key)?;
        }
        for (name, value) in &overrides.headers {
            profile.set_header(name, value)?;
        }
        for (key, value) in overrides.default_arguments {
            profile.set_default_argument(key, value);
        }

        debug!(
            mode = %profile.connection_type(),
            authenticated = profile.authenticated,
            "Derived client"
        );
        Ok(Self::from_profile(profile, Arc::clone(&self.observer)))
    }

    /// Derived client scoped to management access
    pub fn connect_as_qmc(&self) -> Result<Self> {
        self.derive(ClientOverrides::new().security_context(SecurityContext::ManagementAccess))
    }

    /// Derived client scoped to application access
    pub fn connect_as_hub(&self) -> Result<Self> {
        self.derive(ClientOverrides::new().security_context(SecurityContext::AppAccess))
    }

    pub fn with_content_type(&self, content_type: &str) -> Result<Self> {
        self.derive(ClientOverrides::new().content_type(content_type))
    }

    pub fn with_xrfkey(&self, key: &str) -> Result<Self> {
        self.derive(ClientOverrides::new().xrfkey(key))
    }
}

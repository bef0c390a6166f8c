//! Per-user direct connections sharing one certificate set
//!
//! Service tooling often acts on behalf of many repository users. The
//! factory loads certificates once and hands out one scoped client per user,
//! plus a cached client for the internal service account.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use senserest_core::{ClientObserver, NoopObserver, Shared};
use senserest_domain::constants::{
    ADMIN_USER_ID, DEFAULT_DIRECT_PORT, INTERNAL_DIRECTORY, RESET_RULE_CACHE_ENDPOINT,
    SECURITY_HEADER, USER_ENDPOINT,
};
use senserest_domain::{RestError, Result, SecurityContext, User};
use tracing::{debug, info, instrument};

use crate::api::RestClient;
use crate::certs::CertificateSet;
use crate::connection::ConnectionStrategy;

/// Builds direct-connection clients for arbitrary users
pub struct ClientFactory {
    url: String,
    certificates: Shared<CertificateSet>,
    context: SecurityContext,
    port: u16,
    certificate_validation: bool,
    observer: Arc<dyn ClientObserver>,
    admin: OnceCell<Arc<RestClient>>,
}

impl ClientFactory {
    /// Factory for the repository at `url`
    ///
    /// Server certificates are not validated by default since repository
    /// nodes usually present a certificate signed by the site's own root.
    #[must_use]
    pub fn new(url: impl Into<String>, certificates: CertificateSet, context: SecurityContext) -> Self {
        Self {
            url: url.into(),
            certificates: Shared::new(certificates),
            context,
            port: DEFAULT_DIRECT_PORT,
            certificate_validation: false,
            observer: Arc::new(NoopObserver),
            admin: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_certificate_validation(mut self, enabled: bool) -> Self {
        self.certificate_validation = enabled;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Client acting as `user_directory\user_id`
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] for an invalid URL or identity.
    pub fn client(&self, user_directory: &str, user_id: &str) -> Result<RestClient> {
        let mut client = RestClient::new(&self.url)?.with_observer(Arc::clone(&self.observer));
        client.set_certificate_validation(self.certificate_validation);
        client.configure(ConnectionStrategy::DirectConnection {
            user_directory: user_directory.to_string(),
            user_id: user_id.to_string(),
            port: self.port,
            certificates: Some(self.certificates.clone()),
        })?;
        client.set_header(SECURITY_HEADER, self.context.header_value())?;
        debug!(user_directory, user_id, "Created client");
        Ok(client)
    }

    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] when the user lacks a directory or id.
    pub fn client_for(&self, user: &User) -> Result<RestClient> {
        match (user.directory.as_deref(), user.id.as_deref()) {
            (Some(directory), Some(id)) => self.client(directory, id),
            _ => Err(RestError::InvalidArgument(format!("user {user} is not fully qualified"))),
        }
    }

    /// Client for the internal service account, created once
    pub fn admin_client(&self) -> Result<Arc<RestClient>> {
        self.admin
            .get_or_try_init(|| self.client(INTERNAL_DIRECTORY, ADMIN_USER_ID).map(Arc::new))
            .map(Arc::clone)
    }

    /// Repository users outside the internal directory
    #[instrument(skip(self))]
    pub async fn all_users(&self) -> Result<Vec<User>> {
        let users: Vec<User> = self.admin_client()?.get_json(USER_ENDPOINT).await?;
        Ok(users
            .into_iter()
            .filter(|user| user.directory.as_deref() != Some(INTERNAL_DIRECTORY))
            .collect())
    }

    /// Drop the cached security rule evaluation on the repository
    #[instrument(skip(self))]
    pub async fn clear_rule_cache(&self) -> Result<()> {
        self.admin_client()?.post(RESET_RULE_CACHE_ENDPOINT, "").await?;
        info!("Security rule cache cleared");
        Ok(())
    }
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("url", &self.url)
            .field("context", &self.context)
            .field("port", &self.port)
            .field("certificate_validation", &self.certificate_validation)
            .finish_non_exhaustive()
    }
}

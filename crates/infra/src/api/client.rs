//! The REST client
//!
//! Every call funnels through the same three steps: check that a connection
//! mode was chosen, let the coordinator make sure the handshake has run, then
//! hand the call to the dispatcher.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use once_cell::sync::OnceCell;
use reqwest::header::HeaderMap;
use reqwest::{Method, Response, StatusCode};
use senserest_core::{AuthCoordinator, AuthState, ClientObserver, NoopObserver, Xrfkey};
use senserest_domain::{ClientSettings, ConnectionType, RestError, Result, SessionInfo, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::content::RawContent;
use super::dispatch::{Body, Call, Dispatcher};
use crate::certs::CertificateSet;
use crate::connection::{ConnectionStrategy, RequestCredential};
use crate::errors::transport_error;
use crate::profile::ConnectionProfile;

/// A transport and coordinator built from a configured profile
pub(crate) struct Connection {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) coordinator: AuthCoordinator,
}

/// Authenticated client for the repository and cloud tenant APIs
///
/// Configure it once with one of the `as_*` methods (or
/// [`RestClient::configure`]), then share it freely: concurrent callers
/// trigger at most one authentication handshake.
///
/// ```no_run
/// # async fn run() -> senserest_domain::Result<()> {
/// use senserest_infra::RestClient;
///
/// let mut client = RestClient::new("https://tenant.example.com")?;
/// client.as_api_key_via_cloud("my-api-key")?;
/// let items = client.get("/api/v1/items").await?;
/// # let _ = items;
/// # Ok(())
/// # }
/// ```
pub struct RestClient {
    pub(crate) profile: ConnectionProfile,
    pub(crate) observer: Arc<dyn ClientObserver>,
    connection: OnceCell<Arc<Connection>>,
}

impl RestClient {
    /// Unconfigured client for `url`
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] when `url` is not an http(s) address.
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self::from_profile(ConnectionProfile::new(url)?, Arc::new(NoopObserver)))
    }

    pub(crate) fn from_profile(profile: ConnectionProfile, observer: Arc<dyn ClientObserver>) -> Self {
        Self { profile, observer, connection: OnceCell::new() }
    }

    /// Unconfigured client with `settings` applied
    ///
    /// # Errors
    ///
    /// Invalid URL, proxy, xrfkey, or an unreadable certificate directory.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let mut client = Self::new(&settings.url)?;
        client.set_timeout(settings.timeout_secs.map(Duration::from_secs));
        client.profile.proxy = settings.proxy.clone();
        client.profile.user_agent = settings.user_agent.clone();
        if let Some(key) = &settings.xrfkey {
            client.set_xrfkey(key)?;
        }
        if let Some(dir) = &settings.certificate_dir {
            client.set_certificates(CertificateSet::from_directory(dir)?);
        }
        client.set_certificate_validation(settings.certificate_validation);
        client.set_content_type(settings.content_type.clone());
        Ok(client)
    }

    /// Report calls, responses and authentication progress to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.reset_connection();
        self.observer = observer;
        self
    }

    /* ---------------------------------------------------------------------- */
    /* Connection modes */
    /* ---------------------------------------------------------------------- */

    /// Select the connection mode
    ///
    /// # Errors
    ///
    /// See [`ConnectionProfile::configure`].
    pub fn configure(&mut self, strategy: ConnectionStrategy) -> Result<()> {
        self.reset_connection();
        info!(mode = %strategy.connection_type(), url = %self.profile.url(), "Configuring connection");
        self.profile.configure(strategy)
    }

    /// Mutual TLS on the repository port
    ///
    /// `certificates` may be `None` when the set was loaded earlier through
    /// [`RestClient::set_certificates`] or settings.
    pub fn as_direct_connection(
        &mut self,
        user_directory: &str,
        user_id: &str,
        port: u16,
        certificates: Option<CertificateSet>,
    ) -> Result<()> {
        self.configure(ConnectionStrategy::DirectConnection {
            user_directory: user_directory.to_string(),
            user_id: user_id.to_string(),
            port,
            certificates: certificates.map(senserest_core::Shared::new),
        })
    }

    pub fn as_ntlm_user_via_proxy(&mut self, credential: Option<Arc<dyn RequestCredential>>) -> Result<()> {
        self.configure(ConnectionStrategy::NtlmUserViaProxy { credential })
    }

    pub fn as_static_header_user_via_proxy(&mut self, user_id: &str, header_name: &str) -> Result<()> {
        self.configure(ConnectionStrategy::StaticHeaderUserViaProxy {
            user_id: user_id.to_string(),
            header_name: header_name.to_string(),
        })
    }

    pub fn as_anonymous_user_via_proxy(&mut self) -> Result<()> {
        self.configure(ConnectionStrategy::AnonymousViaProxy)
    }

    pub fn as_jwt_via_proxy(&mut self, token: &str) -> Result<()> {
        self.configure(ConnectionStrategy::JwtTokenViaProxy { token: token.to_string() })
    }

    pub fn as_jwt_via_cloud(&mut self, token: &str) -> Result<()> {
        self.configure(ConnectionStrategy::JwtTokenViaCloud { token: token.to_string() })
    }

    pub fn as_api_key_via_cloud(&mut self, api_key: &str) -> Result<()> {
        self.configure(ConnectionStrategy::ApiKeyViaCloud { api_key: api_key.to_string() })
    }

    pub fn as_client_credentials_via_cloud(&mut self, client_id: &str, client_secret: &str) -> Result<()> {
        self.configure(ConnectionStrategy::ClientCredentialsViaCloud {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    pub fn as_existing_session_via_proxy(&mut self, session_id: &str, cookie_name: &str) -> Result<()> {
        self.configure(ConnectionStrategy::ExistingSessionViaProxy {
            session_id: session_id.to_string(),
            cookie_name: cookie_name.to_string(),
        })
    }

    pub fn as_existing_session_via_cloud(&mut self, session: SessionInfo) -> Result<()> {
        self.configure(ConnectionStrategy::ExistingSessionViaCloud { session })
    }

    /* ---------------------------------------------------------------------- */
    /* Setup */
    /* ---------------------------------------------------------------------- */

    /// Per-request timeout; `None` (the default) waits indefinitely
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.reset_connection();
        self.profile.timeout = timeout;
    }

    pub fn set_proxy(&mut self, proxy: impl Into<String>) {
        self.reset_connection();
        self.profile.proxy = Some(proxy.into());
    }

    /// Application identifier sent ahead of the library user agent
    pub fn set_user_agent(&mut self, agent: impl Into<String>) {
        self.reset_connection();
        self.profile.user_agent = Some(agent.into());
    }

    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] unless `key` is 16 alphanumerics.
    pub fn set_xrfkey(&mut self, key: &str) -> Result<()> {
        self.reset_connection();
        self.profile.set_xrfkey(key)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.reset_connection();
        self.profile.content_type = content_type.into();
    }

    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] for an illegal header name or value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.reset_connection();
        self.profile.set_header(name, value)
    }

    /// Append `key=value` to the query of every call, ahead of `xrfkey`
    pub fn set_default_argument(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.reset_connection();
        self.profile.set_default_argument(key, value);
    }

    /// Accept invalid server certificates when `false`
    pub fn set_certificate_validation(&mut self, enabled: bool) {
        self.reset_connection();
        self.profile.certificate_validation = enabled;
    }

    pub fn set_certificates(&mut self, certificates: CertificateSet) {
        self.reset_connection();
        self.profile.set_certificates(certificates);
    }

    /// Drop the built transport; a handshake that already succeeded stays
    /// recorded on the profile.
    fn reset_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.profile.authenticated |= connection.coordinator.is_authenticated();
            if let Some(cause) = connection.coordinator.failure() {
                self.profile.auth_failure = Some(cause);
            }
        }
    }

    /* ---------------------------------------------------------------------- */
    /* State */
    /* ---------------------------------------------------------------------- */

    #[must_use]
    pub fn url(&self) -> &Url {
        self.profile.url()
    }

    #[must_use]
    pub const fn connection_type(&self) -> ConnectionType {
        self.profile.connection_type()
    }

    /// Identity the client acts as; `None` when the proxy decides
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.profile.user()
    }

    #[must_use]
    pub const fn is_cloud(&self) -> bool {
        self.profile.is_cloud()
    }

    /// Custom headers sent with every call
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.profile.headers()
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        self.profile.content_type()
    }

    #[must_use]
    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        match self.connection.get() {
            Some(connection) => connection.coordinator.state(),
            None if self.profile.connection_type() != ConnectionType::Undefined
                && self.profile.authenticated =>
            {
                AuthState::Authenticated
            }
            None if self.profile.auth_failure.is_some() => AuthState::Failed,
            None => AuthState::Unauthenticated,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_state() == AuthState::Authenticated
    }

    /// Anti-CSRF key sent with calls, once the connection is built
    #[must_use]
    pub fn xrfkey(&self) -> Option<&Xrfkey> {
        self.connection.get().and_then(|connection| connection.dispatcher.xrfkey())
    }

    /// Cloud session cookies and CSRF token for handing to another client
    #[must_use]
    pub fn session_info(&self) -> SessionInfo {
        self.profile.session_info()
    }

    /* ---------------------------------------------------------------------- */
    /* Calls */
    /* ---------------------------------------------------------------------- */

    fn connection(&self) -> Result<&Arc<Connection>> {
        if self.profile.connection_type() == ConnectionType::Undefined {
            return Err(RestError::ConnectionNotConfigured);
        }

        self.connection.get_or_try_init(|| {
            debug!(mode = %self.profile.connection_type(), "Building connection");
            let dispatcher = Arc::new(Dispatcher::new(&self.profile, Arc::clone(&self.observer))?);
            let procedure =
                self.profile.handshake.as_ref().map(|handshake| handshake.procedure(Arc::clone(&dispatcher)));
            let mut coordinator = AuthCoordinator::seeded(self.profile.authenticated, procedure)
                .with_observer(Arc::clone(&self.observer));
            if let Some(cause) = &self.profile.auth_failure {
                coordinator = coordinator.with_failure(Arc::clone(cause));
            }
            Ok(Arc::new(Connection { dispatcher, coordinator }))
        })
    }

    /// Run the handshake now instead of on the first call
    ///
    /// # Errors
    ///
    /// [`RestError::ConnectionNotConfigured`] or the cached
    /// [`RestError::AuthenticationFailed`].
    pub async fn authenticate(&self) -> Result<()> {
        self.connection()?.coordinator.ensure_authenticated().await
    }

    async fn call(&self, call: Call<'_>) -> Result<Response> {
        let connection = self.connection()?;
        connection.coordinator.ensure_authenticated().await?;
        connection.dispatcher.execute(call).await
    }

    /// GET returning the body as text
    #[instrument(skip(self))]
    pub async fn get(&self, endpoint: &str) -> Result<String> {
        read_text(self.call(Call::new(Method::GET, endpoint)).await?).await
    }

    #[instrument(skip(self))]
    pub async fn get_bytes(&self, endpoint: &str) -> Result<Bytes> {
        let response = self.call(Call::new(Method::GET, endpoint)).await?;
        response.bytes().await.map_err(transport_error)
    }

    /// GET returning the body as it arrives
    pub async fn get_stream(&self, endpoint: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let response = self.call(Call::new(Method::GET, endpoint)).await?;
        Ok(response.bytes_stream().map(|chunk| chunk.map_err(transport_error)).boxed())
    }

    /// GET returning the raw response
    ///
    /// With `fail_on_status = false` a non-success status is returned
    /// instead of raised.
    pub async fn get_http(&self, endpoint: &str, fail_on_status: bool) -> Result<Response> {
        self.call(Call::new(Method::GET, endpoint).fail_on_status(fail_on_status)).await
    }

    #[instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        decode_json(self.call(Call::new(Method::GET, endpoint)).await?).await
    }

    #[instrument(skip(self, body))]
    pub async fn post(&self, endpoint: &str, body: impl Into<String>) -> Result<String> {
        read_text(self.call(Call::new(Method::POST, endpoint).body(Body::Text(body.into()))).await?).await
    }

    pub async fn post_bytes(&self, endpoint: &str, body: impl Into<Bytes>) -> Result<String> {
        read_text(self.call(Call::new(Method::POST, endpoint).body(Body::Bytes(body.into()))).await?).await
    }

    pub async fn post_raw(&self, endpoint: &str, content: RawContent) -> Result<String> {
        read_text(self.call(Call::new(Method::POST, endpoint).body(Body::Raw(content))).await?).await
    }

    pub async fn post_http(
        &self,
        endpoint: &str,
        body: impl Into<String>,
        fail_on_status: bool,
    ) -> Result<Response> {
        self.call(
            Call::new(Method::POST, endpoint)
                .body(Body::Text(body.into()))
                .fail_on_status(fail_on_status),
        )
        .await
    }

    #[instrument(skip(self, body))]
    pub async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = Body::Json(encode_json(body)?);
        decode_json(self.call(Call::new(Method::POST, endpoint).body(body)).await?).await
    }

    #[instrument(skip(self, body))]
    pub async fn put(&self, endpoint: &str, body: impl Into<String>) -> Result<String> {
        read_text(self.call(Call::new(Method::PUT, endpoint).body(Body::Text(body.into()))).await?).await
    }

    pub async fn put_bytes(&self, endpoint: &str, body: impl Into<Bytes>) -> Result<String> {
        read_text(self.call(Call::new(Method::PUT, endpoint).body(Body::Bytes(body.into()))).await?).await
    }

    pub async fn put_raw(&self, endpoint: &str, content: RawContent) -> Result<String> {
        read_text(self.call(Call::new(Method::PUT, endpoint).body(Body::Raw(content))).await?).await
    }

    #[instrument(skip(self, body))]
    pub async fn put_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = Body::Json(encode_json(body)?);
        decode_json(self.call(Call::new(Method::PUT, endpoint).body(body)).await?).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, endpoint: &str) -> Result<String> {
        read_text(self.call(Call::new(Method::DELETE, endpoint)).await?).await
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("profile", &self.profile)
            .field("state", &self.auth_state())
            .finish_non_exhaustive()
    }
}

async fn read_text(response: Response) -> Result<String> {
    response.text().await.map_err(transport_error)
}

fn encode_json<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    serde_json::to_vec(body)
        .map_err(|e| RestError::Serialization(format!("Failed to serialize body: {e}")))
}

/// Decode a JSON body; 204/205 decode from `null`
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
            RestError::Deserialization(format!(
                "No content response ({}), but response type cannot be deserialized from empty body",
                status.as_u16()
            ))
        });
    }

    let body = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body)
        .map_err(|e| RestError::Deserialization(format!("Failed to parse response: {e}")))
}

//! Connection profile and session artifacts

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use senserest_core::{PerClient, Shared, Xrfkey};
use senserest_domain::constants::{
    CSRF_TOKEN_COOKIE, DEFAULT_CONTENT_TYPE, SESSION_COOKIE, SESSION_SIGNATURE_COOKIE,
};
use senserest_domain::{ConnectionType, RestError, Result, SessionInfo, User};
use url::Url;

use crate::certs::CertificateSet;
use crate::connection::{ConnectionStrategy, Handshake, RequestCredential};
use crate::errors::InfraError;

/// Everything needed to shape a call
///
/// Field ownership follows the wrapper types: `Shared` fields are the same
/// object in a derived client, `PerClient` fields are copied.
#[derive(Clone)]
pub struct ConnectionProfile {
    pub(crate) base_url: Url,
    pub(crate) connection_type: ConnectionType,
    pub(crate) user: Option<User>,
    pub(crate) headers: PerClient<HeaderMap>,
    pub(crate) default_arguments: PerClient<Vec<(String, String)>>,
    pub(crate) cookies: Shared<Jar>,
    pub(crate) certificates: Option<Shared<CertificateSet>>,
    pub(crate) session: Shared<SessionArtifacts>,
    pub(crate) credential: Option<Arc<dyn RequestCredential>>,
    pub(crate) handshake: Option<Handshake>,
    pub(crate) content_type: String,
    pub(crate) auto_redirect: bool,
    pub(crate) is_cloud: bool,
    pub(crate) xrfkey: Option<Xrfkey>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) proxy: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) certificate_validation: bool,
    pub(crate) authenticated: bool,
    /// Handshake failure carried across connection rebuilds
    pub(crate) auth_failure: Option<Arc<RestError>>,
}

impl ConnectionProfile {
    /// Unconfigured profile for `url`
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] when `url` is not an absolute http(s)
    /// address.
    pub fn new(url: &str) -> Result<Self> {
        let base_url = Url::parse(url).map_err(|e| RestError::from(InfraError::from(e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(RestError::InvalidArgument(format!(
                "unsupported URL scheme '{}'",
                base_url.scheme()
            )));
        }

        Ok(Self {
            base_url,
            connection_type: ConnectionType::Undefined,
            user: None,
            headers: PerClient::new(HeaderMap::new()),
            default_arguments: PerClient::new(Vec::new()),
            cookies: Shared::new(Jar::default()),
            certificates: None,
            session: Shared::new(SessionArtifacts::default()),
            credential: None,
            handshake: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            auto_redirect: true,
            is_cloud: false,
            xrfkey: None,
            timeout: None,
            proxy: None,
            user_agent: None,
            certificate_validation: true,
            authenticated: false,
            auth_failure: None,
        })
    }

    /// Select the connection mode; allowed once per profile
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] when a mode was already chosen or a
    /// parameter is malformed; [`RestError::CertificatesNotLoaded`] for a
    /// direct connection without certificates.
    pub fn configure(&mut self, strategy: ConnectionStrategy) -> Result<()> {
        if self.connection_type != ConnectionType::Undefined {
            return Err(RestError::InvalidArgument(format!(
                "connection already configured as {}",
                self.connection_type
            )));
        }

        let mut staged = self.clone();
        strategy.apply(&mut staged)?;
        *self = staged;
        Ok(())
    }

    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] unless `key` is 16 alphanumerics.
    pub fn set_xrfkey(&mut self, key: &str) -> Result<()> {
        self.xrfkey = Some(Xrfkey::new(key)?);
        Ok(())
    }

    /// Insert or replace a custom header
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] when the name or value is not a legal
    /// HTTP header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.headers.insert(header_name(name)?, header_value(value)?);
        Ok(())
    }

    pub fn set_default_argument(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.default_arguments.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.default_arguments.push((key, value)),
        }
    }

    pub fn set_certificates(&mut self, certificates: CertificateSet) {
        self.certificates = Some(Shared::new(certificates));
    }

    /// Add a cookie for the base address to the shared jar
    pub(crate) fn add_cookie(&self, name: &str, value: &str) {
        self.cookies.add_cookie_str(&format!("{name}={value}; Path=/"), &self.base_url);
    }

    /// Value of a cookie the jar would send to the base address
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        cookie_value(&self.cookies, &self.base_url, name)
    }

    /// Session snapshot for the base address, for reuse by another client
    #[must_use]
    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            eas_sid: self.cookie(SESSION_COOKIE),
            eas_sid_sig: self.cookie(SESSION_SIGNATURE_COOKIE),
            session_token: self
                .session
                .csrf_token()
                .map(str::to_string)
                .or_else(|| self.cookie(CSRF_TOKEN_COOKIE)),
        }
    }

    /// Forget session artifacts so a derived profile authenticates on its own
    pub(crate) fn detach_session(&mut self) {
        self.session = Shared::new(SessionArtifacts::default());
        self.authenticated = false;
        self.auth_failure = None;
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub const fn is_cloud(&self) -> bool {
        self.is_cloud
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("base_url", &self.base_url.as_str())
            .field("connection_type", &self.connection_type)
            .field("user", &self.user)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("content_type", &self.content_type)
            .field("auto_redirect", &self.auto_redirect)
            .field("is_cloud", &self.is_cloud)
            .field("certificates", &self.certificates.is_some())
            .field("authenticated", &self.authenticated)
            .field("auth_failure", &self.auth_failure)
            .finish_non_exhaustive()
    }
}

/// Tokens produced by a handshake
///
/// Each slot is written once, by the coordinator-guarded procedure, and read
/// by every request after that.
#[derive(Default)]
pub struct SessionArtifacts {
    csrf_token: OnceLock<String>,
    bearer_token: OnceLock<String>,
}

impl SessionArtifacts {
    pub(crate) fn set_csrf_token(&self, token: String) {
        let _ = self.csrf_token.set(token);
    }

    pub(crate) fn set_bearer_token(&self, token: String) {
        let _ = self.bearer_token.set(token);
    }

    #[must_use]
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.get().map(String::as_str)
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.get().map(String::as_str)
    }
}

impl fmt::Debug for SessionArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionArtifacts")
            .field("csrf_token", &self.csrf_token.get().is_some())
            .field("bearer_token", &self.bearer_token.get().is_some())
            .finish()
    }
}

pub(crate) fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| RestError::InvalidArgument(format!("invalid header name '{name}': {e}")))
}

pub(crate) fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| RestError::InvalidArgument(format!("invalid header value: {e}")))
}

pub(crate) fn cookie_value(jar: &Jar, url: &Url, name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(ConnectionProfile::new("ftp://sense"), Err(RestError::InvalidArgument(_))));
        assert!(matches!(ConnectionProfile::new("sense"), Err(RestError::InvalidArgument(_))));
    }

    #[test]
    fn starts_undefined_with_defaults() {
        let profile = ConnectionProfile::new("https://sense.example.com").unwrap();
        assert_eq!(profile.connection_type(), ConnectionType::Undefined);
        assert_eq!(profile.content_type(), "application/json");
        assert!(profile.auto_redirect);
        assert!(profile.certificate_validation);
        assert!(profile.timeout.is_none());
    }

    #[test]
    fn clone_copies_headers_and_shares_jar() {
        let mut parent = ConnectionProfile::new("https://sense.example.com").unwrap();
        parent.set_header("X-Custom", "parent").unwrap();
        parent.set_default_argument("limit", "10");

        let mut child = parent.clone();
        child.set_header("X-Custom", "child").unwrap();
        child.set_default_argument("limit", "50");
        child.add_cookie("X-Qlik-Session", "abc");

        assert_eq!(parent.headers()["x-custom"], "parent");
        assert_eq!(parent.default_arguments[0].1, "10");
        assert!(Shared::ptr_eq(&parent.cookies, &child.cookies));
        assert_eq!(parent.cookie("X-Qlik-Session").as_deref(), Some("abc"));
    }

    #[test]
    fn detach_session_gives_fresh_artifacts() {
        let parent = ConnectionProfile::new("https://sense.example.com").unwrap();
        parent.session.set_csrf_token("token".into());

        let mut child = parent.clone();
        assert!(Shared::ptr_eq(&parent.session, &child.session));
        child.detach_session();
        assert!(child.session.csrf_token().is_none());
        assert_eq!(parent.session.csrf_token(), Some("token"));
    }

    #[test]
    fn session_info_reads_jar_for_base_address() {
        let profile = ConnectionProfile::new("https://tenant.example.com").unwrap();
        profile.add_cookie(SESSION_COOKIE, "sid");
        profile.add_cookie(SESSION_SIGNATURE_COOKIE, "sig");
        profile.add_cookie(CSRF_TOKEN_COOKIE, "csrf");

        let info = profile.session_info();
        assert_eq!(info.eas_sid.as_deref(), Some("sid"));
        assert_eq!(info.eas_sid_sig.as_deref(), Some("sig"));
        assert_eq!(info.session_token.as_deref(), Some("csrf"));
    }

    #[test]
    fn invalid_header_is_rejected() {
        let mut profile = ConnectionProfile::new("https://sense.example.com").unwrap();
        assert!(matches!(profile.set_header("bad header", "x"), Err(RestError::InvalidArgument(_))));
        assert!(matches!(profile.set_header("X-Ok", "line\nbreak"), Err(RestError::InvalidArgument(_))));
    }

    #[test]
    fn xrfkey_setter_validates() {
        let mut profile = ConnectionProfile::new("https://sense.example.com").unwrap();
        assert!(profile.set_xrfkey("0123456789abcdef").is_ok());
        assert!(matches!(profile.set_xrfkey("0123456789abcde!"), Err(RestError::InvalidArgument(_))));
    }
}

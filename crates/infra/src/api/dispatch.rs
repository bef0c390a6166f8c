//! Request shaping and execution for one connection
//!
//! The dispatcher knows nothing about authentication state; callers that
//! need a session run the coordinator first. Handshakes use the dispatcher
//! directly, which is what keeps them from waiting on their own gate.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use senserest_core::ports::ResponseSummary;
use senserest_core::{ClientObserver, Shared, Xrfkey};
use senserest_domain::constants::{
    CSRF_TOKEN_HEADER, DEFAULT_CONTENT_TYPE, XRFKEY_HEADER, XRFKEY_PARAM,
};
use senserest_domain::{RestError, Result};
use tracing::{debug, instrument, warn};
use url::{form_urlencoded, Url};

use super::content::RawContent;
use crate::connection::RequestCredential;
use crate::errors::InfraError;
use crate::http::HttpClient;
use crate::profile::{cookie_value, header_value, ConnectionProfile, SessionArtifacts};

/// Request body variants
#[derive(Debug)]
pub(crate) enum Body {
    Empty,
    Text(String),
    Bytes(Bytes),
    /// Serialized JSON; always sent as `application/json`
    Json(Vec<u8>),
    Raw(RawContent),
}

/// One logical call
#[derive(Debug)]
pub(crate) struct Call<'a> {
    method: Method,
    endpoint: &'a str,
    body: Body,
    headers: HeaderMap,
    fail_on_status: bool,
}

impl<'a> Call<'a> {
    pub(crate) fn new(method: Method, endpoint: &'a str) -> Self {
        Self { method, endpoint, body: Body::Empty, headers: HeaderMap::new(), fail_on_status: true }
    }

    pub(crate) fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Header for this call only; replaces a connection header of the same name
    pub(crate) fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub(crate) fn fail_on_status(mut self, fail: bool) -> Self {
        self.fail_on_status = fail;
        self
    }
}

/// Snapshot of a profile bound to a transport
pub(crate) struct Dispatcher {
    http: HttpClient,
    base_url: Url,
    headers: HeaderMap,
    content_type: String,
    default_arguments: Vec<(String, String)>,
    xrfkey: Option<Xrfkey>,
    session: Shared<SessionArtifacts>,
    cookies: Shared<Jar>,
    credential: Option<Arc<dyn RequestCredential>>,
    observer: Arc<dyn ClientObserver>,
}

impl Dispatcher {
    pub(crate) fn new(profile: &ConnectionProfile, observer: Arc<dyn ClientObserver>) -> Result<Self> {
        let mut http = HttpClient::builder()
            .timeout(profile.timeout)
            .user_agent(profile.user_agent.clone())
            .proxy(profile.proxy.clone())
            .cookie_store(profile.cookies.arc())
            .accept_invalid_certs(!profile.certificate_validation)
            .auto_redirect(profile.auto_redirect);

        if let Some(certificates) = &profile.certificates {
            http = http.identity_pem(certificates.identity_pem().to_vec());
            if let Some(root) = certificates.root_pem() {
                http = http.root_pem(root.to_vec());
            }
        }

        let xrfkey = profile
            .connection_type
            .uses_xrfkey()
            .then(|| profile.xrfkey.clone().unwrap_or_else(Xrfkey::generate));

        Ok(Self {
            http: http.build()?,
            base_url: profile.base_url.clone(),
            headers: (*profile.headers).clone(),
            content_type: profile.content_type.clone(),
            default_arguments: (*profile.default_arguments).clone(),
            xrfkey,
            session: profile.session.clone(),
            cookies: profile.cookies.clone(),
            credential: profile.credential.clone(),
            observer,
        })
    }

    pub(crate) fn session(&self) -> &SessionArtifacts {
        &self.session
    }

    pub(crate) fn cookie(&self, name: &str) -> Option<String> {
        cookie_value(&self.cookies, &self.base_url, name)
    }

    pub(crate) fn xrfkey(&self) -> Option<&Xrfkey> {
        self.xrfkey.as_ref()
    }

    /// Absolute address for `endpoint` with default arguments and the
    /// anti-CSRF parameter appended to its query
    pub(crate) fn target(&self, endpoint: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = if endpoint.is_empty() || endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        };
        let mut url = Url::parse(&joined).map_err(|e| RestError::from(InfraError::from(e)))?;

        let mut appended: Vec<String> = self
            .default_arguments
            .iter()
            .map(|(key, value)| {
                let key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
                let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                format!("{key}={value}")
            })
            .collect();
        if let Some(key) = &self.xrfkey {
            appended.push(format!("{XRFKEY_PARAM}={key}"));
        }

        if !appended.is_empty() {
            let appended = appended.join("&");
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{appended}"),
                _ => appended,
            };
            url.set_query(Some(&query));
        }

        Ok(url)
    }

    /// Issue `call`
    ///
    /// GET follows a single `301 Moved Permanently`; the response to that
    /// second request is returned whatever its status.
    #[instrument(skip(self, call), fields(method = %call.method, endpoint = call.endpoint))]
    pub(crate) async fn execute(&self, call: Call<'_>) -> Result<Response> {
        let Call { method, endpoint, body, headers, fail_on_status } = call;
        self.observer.on_call(method.as_str(), endpoint);

        let url = self.target(endpoint)?;
        let started = Instant::now();
        let mut response = self.send(method.clone(), url, body, &headers).await?;

        if method == Method::GET && response.status() == StatusCode::MOVED_PERMANENTLY {
            if let Some(location) = redirect_target(&response) {
                debug!(location = location.path(), "following 301 once");
                response = self.send(Method::GET, location, Body::Empty, &headers).await?;
            }
        }

        let status = response.status();
        self.observer.on_response(&ResponseSummary {
            method: method.as_str(),
            url: response.url().path(),
            status: status.as_u16(),
            elapsed: started.elapsed(),
        });

        if fail_on_status && !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unknown status").to_string();
            // Best effort: a body that cannot be read must not hide the status.
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), endpoint, "call failed");
            return Err(RestError::HttpFailure { status: status.as_u16(), reason, body });
        }

        Ok(response)
    }

    async fn send(&self, method: Method, url: Url, body: Body, extra: &HeaderMap) -> Result<Response> {
        let mut builder = self.http.request(method, url.clone()).headers(self.headers.clone());

        if let Some(key) = &self.xrfkey {
            builder = builder.header(XRFKEY_HEADER, key.as_str());
        }
        if let Some(token) = self.session.csrf_token() {
            builder = builder.header(CSRF_TOKEN_HEADER, token);
        }
        if let Some(token) = self.session.bearer_token() {
            let mut value = header_value(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            builder = builder.header(AUTHORIZATION, value);
        }

        builder = self.attach_body(builder.headers(extra.clone()), body);

        if let Some(credential) = &self.credential {
            builder = credential.authorize(builder, &url)?;
        }

        self.http.send(builder).await
    }

    fn attach_body(&self, builder: RequestBuilder, body: Body) -> RequestBuilder {
        match body {
            Body::Empty => builder,
            Body::Text(text) => builder.header(CONTENT_TYPE, self.content_type.as_str()).body(text),
            Body::Bytes(bytes) => builder.header(CONTENT_TYPE, self.content_type.as_str()).body(bytes),
            Body::Json(json) => builder.header(CONTENT_TYPE, DEFAULT_CONTENT_TYPE).body(json),
            Body::Raw(raw) => {
                let content_type = raw.content_type.as_deref().unwrap_or(&self.content_type);
                builder.header(CONTENT_TYPE, content_type).body(raw.body)
            }
        }
    }
}

fn redirect_target(response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

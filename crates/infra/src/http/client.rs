use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use senserest_domain::constants::LIBRARY_IDENTIFIER;
use senserest_domain::{RestError, Result};
use tracing::debug;

use crate::errors::transport_error;

/// Redirect hops the transport follows on its own when auto-redirect is on
pub const MAX_AUTO_REDIRECTS: usize = 10;

/// Thin wrapper over a configured reqwest client.
///
/// One instance is built per connection; it owns the connection's cookie
/// store, TLS identity and redirect policy.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// No retries: a failed exchange is reported to the caller as is.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().map_err(transport_error)?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, url = %redact_query(&url), "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(%method, url = %redact_query(&url), %status, "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, url = %redact_query(&url), error = %err, "HTTP request failed");
                Err(transport_error(err))
            }
        }
    }
}

/// Query strings may carry keys; log the path only.
fn redact_query(url: &url::Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Option<Duration>,
    user_agent: Option<String>,
    proxy: Option<String>,
    cookie_store: Option<Arc<Jar>>,
    identity_pem: Option<Vec<u8>>,
    root_pem: Option<Vec<u8>>,
    accept_invalid_certs: bool,
    auto_redirect: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: None,
            proxy: None,
            cookie_store: None,
            identity_pem: None,
            root_pem: None,
            accept_invalid_certs: false,
            auto_redirect: true,
        }
    }
}

impl HttpClientBuilder {
    /// Per-request timeout; `None` waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Application identifier placed in front of the library user agent.
    pub fn user_agent(mut self, agent: Option<String>) -> Self {
        self.user_agent = agent;
        self
    }

    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn cookie_store(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_store = Some(jar);
        self
    }

    /// PEM bundle holding the client private key and certificate chain.
    pub fn identity_pem(mut self, pem: Vec<u8>) -> Self {
        self.identity_pem = Some(pem);
        self
    }

    /// Extra trusted root certificate.
    pub fn root_pem(mut self, pem: Vec<u8>) -> Self {
        self.root_pem = Some(pem);
        self
    }

    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    /// Follow redirects inside the transport.
    ///
    /// `301 Moved Permanently` is never followed here; GET calls handle that
    /// single hop themselves.
    pub fn auto_redirect(mut self, enabled: bool) -> Self {
        self.auto_redirect = enabled;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder()
            .use_rustls_tls()
            .user_agent(library_user_agent(self.user_agent.as_deref()))
            .redirect(redirect_policy(self.auto_redirect));

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match self.proxy {
            Some(proxy) => builder.proxy(reqwest::Proxy::all(&proxy).map_err(|err| {
                RestError::InvalidArgument(format!("invalid proxy '{proxy}': {err}"))
            })?),
            None => builder.no_proxy(),
        };

        if let Some(jar) = self.cookie_store {
            builder = builder.cookie_provider(jar);
        }

        if let Some(pem) = self.identity_pem {
            let identity = reqwest::Identity::from_pem(&pem).map_err(|err| {
                RestError::InvalidArgument(format!("invalid client certificate: {err}"))
            })?;
            builder = builder.identity(identity);
        }

        if let Some(pem) = self.root_pem {
            let root = reqwest::Certificate::from_pem(&pem).map_err(|err| {
                RestError::InvalidArgument(format!("invalid root certificate: {err}"))
            })?;
            builder = builder.add_root_certificate(root);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(transport_error)?;

        Ok(HttpClient { client })
    }
}

/// `senserest/<version>`, prefixed by the application's own agent if any.
pub(crate) fn library_user_agent(custom: Option<&str>) -> String {
    let library = format!("{LIBRARY_IDENTIFIER}/{}", env!("CARGO_PKG_VERSION"));
    match custom.map(str::trim).filter(|agent| !agent.is_empty()) {
        Some(agent) => format!("{agent} {library}"),
        None => library,
    }
}

fn redirect_policy(auto_redirect: bool) -> Policy {
    if !auto_redirect {
        return Policy::none();
    }

    Policy::custom(|attempt| {
        if attempt.status() == StatusCode::MOVED_PERMANENTLY {
            attempt.stop()
        } else if attempt.previous().len() > MAX_AUTO_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

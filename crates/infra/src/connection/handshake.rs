//! Authentication handshakes
//!
//! Each procedure runs under the coordinator's gate and writes the session
//! artifacts it obtains before returning.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use senserest_core::AuthProcedure;
use senserest_domain::constants::{
    CLIENT_CREDENTIALS_GRANT, CLIENT_CREDENTIALS_SCOPE, COOKIE_HANDSHAKE_ENDPOINT,
    CSRF_TOKEN_COOKIE, JWT_SESSION_ENDPOINT, OAUTH_TOKEN_ENDPOINT,
};
use senserest_domain::{RestError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::api::dispatch::{Body, Call, Dispatcher};
use crate::errors::transport_error;
use crate::profile::header_value;

/// Which handshake a connection mode needs
#[derive(Clone)]
pub(crate) enum Handshake {
    /// `GET /qrs/about`; the proxy answers with a session cookie
    SessionCookie,
    /// `POST /login/jwt-session`; the tenant answers with session and CSRF cookies
    JwtSession,
    /// OAuth client-credentials grant against `/oauth/token`
    ClientCredentials { client_id: String, client_secret: String },
}

impl Handshake {
    pub(crate) fn procedure(&self, dispatcher: Arc<Dispatcher>) -> Arc<dyn AuthProcedure> {
        match self {
            Self::SessionCookie => Arc::new(SessionCookieHandshake { dispatcher }),
            Self::JwtSession => Arc::new(JwtSessionHandshake { dispatcher }),
            Self::ClientCredentials { client_id, client_secret } => {
                Arc::new(ClientCredentialsHandshake {
                    dispatcher,
                    encoded: BASE64_STANDARD.encode(format!("{client_id}:{client_secret}")),
                })
            }
        }
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionCookie => f.write_str("SessionCookie"),
            Self::JwtSession => f.write_str("JwtSession"),
            Self::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

struct SessionCookieHandshake {
    dispatcher: Arc<Dispatcher>,
}

#[async_trait]
impl AuthProcedure for SessionCookieHandshake {
    fn name(&self) -> &'static str {
        "session_cookie"
    }

    #[instrument(skip(self), name = "session_cookie_handshake")]
    async fn authenticate(&self) -> Result<()> {
        debug!(endpoint = COOKIE_HANDSHAKE_ENDPOINT, "Authenticating");
        self.dispatcher.execute(Call::new(Method::GET, COOKIE_HANDSHAKE_ENDPOINT)).await?;
        Ok(())
    }
}

struct JwtSessionHandshake {
    dispatcher: Arc<Dispatcher>,
}

#[async_trait]
impl AuthProcedure for JwtSessionHandshake {
    fn name(&self) -> &'static str {
        "jwt_session"
    }

    #[instrument(skip(self), name = "jwt_session_handshake")]
    async fn authenticate(&self) -> Result<()> {
        debug!(endpoint = JWT_SESSION_ENDPOINT, "Authenticating");
        self.dispatcher
            .execute(Call::new(Method::POST, JWT_SESSION_ENDPOINT).body(Body::Text(String::new())))
            .await?;

        let token = self.dispatcher.cookie(CSRF_TOKEN_COOKIE).ok_or_else(|| {
            RestError::Protocol(format!(
                "{JWT_SESSION_ENDPOINT} did not return a {CSRF_TOKEN_COOKIE} cookie"
            ))
        })?;
        self.dispatcher.session().set_csrf_token(token);
        Ok(())
    }
}

struct ClientCredentialsHandshake {
    dispatcher: Arc<Dispatcher>,
    /// base64 of `client_id:client_secret`
    encoded: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    scope: &'a str,
    grant_type: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[async_trait]
impl AuthProcedure for ClientCredentialsHandshake {
    fn name(&self) -> &'static str {
        "client_credentials"
    }

    #[instrument(skip(self), name = "client_credentials_handshake")]
    async fn authenticate(&self) -> Result<()> {
        debug!(endpoint = OAUTH_TOKEN_ENDPOINT, "Requesting access token");

        let body = serde_json::to_vec(&TokenRequest {
            scope: CLIENT_CREDENTIALS_SCOPE,
            grant_type: CLIENT_CREDENTIALS_GRANT,
        })
        .map_err(|e| RestError::Serialization(e.to_string()))?;

        let mut basic = header_value(&format!("Basic {}", self.encoded))?;
        basic.set_sensitive(true);

        let response = self
            .dispatcher
            .execute(
                Call::new(Method::POST, OAUTH_TOKEN_ENDPOINT)
                    .header(AUTHORIZATION, basic)
                    .body(Body::Json(body)),
            )
            .await?;

        let token: TokenResponse = response.json().await.map_err(transport_error)?;
        let access_token = token.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            RestError::Protocol("token endpoint response carried no access_token".to_string())
        })?;

        self.dispatcher.session().set_bearer_token(access_token);
        Ok(())
    }
}

//! The ten ways a client can reach the service
//!
//! Applying a strategy is pure configuration: headers, cookies and flags
//! on the profile, plus the handshake (if any) that the coordinator runs
//! before the first call.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, USER_AGENT};
use senserest_core::Shared;
use senserest_domain::constants::{
    CSRF_TOKEN_HEADER, NTLM_USER_AGENT, SESSION_COOKIE, SESSION_SIGNATURE_COOKIE, USER_HEADER,
};
use senserest_domain::{ConnectionType, RestError, Result, SessionInfo, User};

use super::{Handshake, RequestCredential};
use crate::certs::CertificateSet;
use crate::profile::{header_name, header_value, ConnectionProfile};

/// One connection mode together with its parameters
#[derive(Clone)]
pub enum ConnectionStrategy {
    /// Mutual TLS straight to the repository service port
    DirectConnection {
        user_directory: String,
        user_id: String,
        port: u16,
        /// Falls back to certificates already on the profile
        certificates: Option<Shared<CertificateSet>>,
    },
    NtlmUserViaProxy { credential: Option<Arc<dyn RequestCredential>> },
    StaticHeaderUserViaProxy { user_id: String, header_name: String },
    AnonymousViaProxy,
    JwtTokenViaProxy { token: String },
    JwtTokenViaCloud { token: String },
    ApiKeyViaCloud { api_key: String },
    ClientCredentialsViaCloud { client_id: String, client_secret: String },
    ExistingSessionViaProxy { session_id: String, cookie_name: String },
    ExistingSessionViaCloud { session: SessionInfo },
}

impl ConnectionStrategy {
    #[must_use]
    pub const fn connection_type(&self) -> ConnectionType {
        match self {
            Self::DirectConnection { .. } => ConnectionType::DirectConnection,
            Self::NtlmUserViaProxy { .. } => ConnectionType::NtlmUserViaProxy,
            Self::StaticHeaderUserViaProxy { .. } => ConnectionType::StaticHeaderUserViaProxy,
            Self::AnonymousViaProxy => ConnectionType::AnonymousViaProxy,
            Self::JwtTokenViaProxy { .. } => ConnectionType::JwtTokenViaProxy,
            Self::JwtTokenViaCloud { .. } => ConnectionType::JwtTokenViaCloud,
            Self::ApiKeyViaCloud { .. } => ConnectionType::ApiKeyViaCloud,
            Self::ClientCredentialsViaCloud { .. } => ConnectionType::ClientCredentialsViaCloud,
            Self::ExistingSessionViaProxy { .. } => ConnectionType::ExistingSessionViaProxy,
            Self::ExistingSessionViaCloud { .. } => ConnectionType::ExistingSessionViaCloud,
        }
    }

    pub(crate) fn apply(self, profile: &mut ConnectionProfile) -> Result<()> {
        let mode = self.connection_type();

        match self {
            Self::DirectConnection { user_directory, user_id, port, certificates } => {
                let certificates = certificates
                    .or_else(|| profile.certificates.clone())
                    .ok_or(RestError::CertificatesNotLoaded)?;
                validate_identity_part("user directory", &user_directory)?;
                validate_identity_part("user id", &user_id)?;

                profile.base_url.set_port(Some(port)).map_err(|()| {
                    RestError::InvalidArgument(format!(
                        "cannot set port on '{}'",
                        profile.base_url
                    ))
                })?;
                profile.headers.insert(
                    header_name(USER_HEADER)?,
                    header_value(&format!("UserDirectory={user_directory};UserId={user_id}"))?,
                );
                profile.certificates = Some(certificates);
                profile.user = Some(User::new(user_directory, user_id));
            }
            Self::NtlmUserViaProxy { credential } => {
                profile.headers.insert(USER_AGENT, header_value(NTLM_USER_AGENT)?);
                profile.credential = credential;
                profile.handshake = Some(Handshake::SessionCookie);
            }
            Self::StaticHeaderUserViaProxy { user_id, header_name: name } => {
                profile.headers.insert(header_name(&name)?, header_value(&user_id)?);
                profile.user = Some(User::with_unknown_directory(user_id));
            }
            Self::AnonymousViaProxy => {}
            Self::JwtTokenViaProxy { token } | Self::ApiKeyViaCloud { api_key: token } => {
                install_bearer(profile, &token)?;
            }
            Self::JwtTokenViaCloud { token } => {
                install_bearer(profile, &token)?;
                profile.handshake = Some(Handshake::JwtSession);
            }
            Self::ClientCredentialsViaCloud { client_id, client_secret } => {
                if client_id.is_empty() || client_secret.is_empty() {
                    return Err(RestError::InvalidArgument(
                        "client id and client secret are required".to_string(),
                    ));
                }
                profile.handshake = Some(Handshake::ClientCredentials { client_id, client_secret });
            }
            Self::ExistingSessionViaProxy { session_id, cookie_name } => {
                if session_id.is_empty() || cookie_name.is_empty() {
                    return Err(RestError::InvalidArgument(
                        "session id and cookie name are required".to_string(),
                    ));
                }
                profile.add_cookie(&cookie_name, &session_id);
            }
            Self::ExistingSessionViaCloud { session } => {
                let (Some(sid), Some(sig)) = (session.eas_sid, session.eas_sid_sig) else {
                    return Err(RestError::InvalidArgument(
                        "cloud session requires both eas.sid and eas.sid.sig".to_string(),
                    ));
                };
                if let Some(token) = session.session_token {
                    profile.headers.insert(header_name(CSRF_TOKEN_HEADER)?, header_value(&token)?);
                }
                profile.add_cookie(SESSION_COOKIE, &sid);
                profile.add_cookie(SESSION_SIGNATURE_COOKIE, &sig);
            }
        }

        profile.connection_type = mode;
        profile.is_cloud = mode.is_cloud();
        profile.auto_redirect = mode.allows_auto_redirect();
        debug_assert_eq!(
            profile.handshake.is_some(),
            mode.requires_handshake(),
            "{mode} installed the wrong handshake"
        );
        profile.authenticated = !mode.requires_handshake();
        Ok(())
    }
}

impl fmt::Debug for ConnectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectConnection { user_directory, user_id, port, certificates } => f
                .debug_struct("DirectConnection")
                .field("user_directory", user_directory)
                .field("user_id", user_id)
                .field("port", port)
                .field("certificates", &certificates.is_some())
                .finish(),
            Self::StaticHeaderUserViaProxy { user_id, header_name } => f
                .debug_struct("StaticHeaderUserViaProxy")
                .field("user_id", user_id)
                .field("header_name", header_name)
                .finish(),
            Self::ClientCredentialsViaCloud { client_id, .. } => f
                .debug_struct("ClientCredentialsViaCloud")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            // Everything else carries a secret
            other => f.write_str(match other.connection_type() {
                ConnectionType::NtlmUserViaProxy => "NtlmUserViaProxy",
                ConnectionType::AnonymousViaProxy => "AnonymousViaProxy",
                ConnectionType::JwtTokenViaProxy => "JwtTokenViaProxy { .. }",
                ConnectionType::JwtTokenViaCloud => "JwtTokenViaCloud { .. }",
                ConnectionType::ApiKeyViaCloud => "ApiKeyViaCloud { .. }",
                ConnectionType::ExistingSessionViaProxy => "ExistingSessionViaProxy { .. }",
                _ => "ExistingSessionViaCloud { .. }",
            }),
        }
    }
}

fn install_bearer(profile: &mut ConnectionProfile, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(RestError::InvalidArgument("bearer token must not be empty".to_string()));
    }
    let mut value = header_value(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    profile.headers.insert(AUTHORIZATION, value);
    Ok(())
}

fn validate_identity_part(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RestError::InvalidArgument(format!("{label} must not be empty")));
    }
    if value.contains([';', '=']) {
        return Err(RestError::InvalidArgument(format!(
            "{label} '{value}' must not contain ';' or '='"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use senserest_domain::constants::XRFKEY_HEADER;

    use super::*;

    fn profile() -> ConnectionProfile {
        ConnectionProfile::new("https://sense.example.com").unwrap()
    }

    fn certificates() -> Shared<CertificateSet> {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/certs");
        Shared::new(CertificateSet::from_directory(dir).unwrap())
    }

    #[test]
    fn direct_connection_requires_certificates() {
        let mut profile = profile();
        let err = profile
            .configure(ConnectionStrategy::DirectConnection {
                user_directory: "CORP".into(),
                user_id: "jane".into(),
                port: 4242,
                certificates: None,
            })
            .unwrap_err();

        assert!(matches!(err, RestError::CertificatesNotLoaded));
        assert_eq!(profile.connection_type(), ConnectionType::Undefined);
    }

    #[test]
    fn direct_connection_sets_identity_header_and_port() {
        let mut profile = profile();
        profile
            .configure(ConnectionStrategy::DirectConnection {
                user_directory: "CORP".into(),
                user_id: "jane".into(),
                port: 4242,
                certificates: Some(certificates()),
            })
            .unwrap();

        assert_eq!(profile.url().port(), Some(4242));
        assert_eq!(profile.headers()["x-qlik-user"], "UserDirectory=CORP;UserId=jane");
        assert_eq!(profile.user(), Some(&User::new("CORP", "jane")));
        assert!(profile.authenticated);
        assert!(profile.handshake.is_none());
        assert!(profile.headers().get(XRFKEY_HEADER).is_none());
    }

    #[test]
    fn direct_connection_rejects_malformed_identity() {
        let mut profile = profile();
        let err = profile
            .configure(ConnectionStrategy::DirectConnection {
                user_directory: "CORP".into(),
                user_id: "jane;UserId=admin".into(),
                port: 4242,
                certificates: Some(certificates()),
            })
            .unwrap_err();
        assert!(matches!(err, RestError::InvalidArgument(_)));
    }

    #[test]
    fn second_configure_is_rejected() {
        let mut profile = profile();
        profile.configure(ConnectionStrategy::AnonymousViaProxy).unwrap();
        let err = profile
            .configure(ConnectionStrategy::ApiKeyViaCloud { api_key: "key".into() })
            .unwrap_err();
        assert!(matches!(err, RestError::InvalidArgument(msg) if msg.contains("anonymous_via_proxy")));
    }

    #[test]
    fn ntlm_sets_windows_user_agent_and_cookie_handshake() {
        let mut profile = profile();
        profile.configure(ConnectionStrategy::NtlmUserViaProxy { credential: None }).unwrap();

        assert_eq!(profile.headers()[USER_AGENT], "Windows");
        assert!(matches!(profile.handshake, Some(Handshake::SessionCookie)));
        assert!(!profile.authenticated);
        assert!(profile.user().is_none());
    }

    #[test]
    fn static_header_leaves_directory_unknown() {
        let mut profile = profile();
        profile
            .configure(ConnectionStrategy::StaticHeaderUserViaProxy {
                user_id: "jane".into(),
                header_name: "X-Sense-User".into(),
            })
            .unwrap();

        assert_eq!(profile.headers()["x-sense-user"], "jane");
        assert_eq!(profile.user().unwrap().to_string(), "<unknown>\\jane");
        assert!(profile.authenticated);
    }

    #[test]
    fn api_key_disables_auto_redirect_and_marks_cloud() {
        let mut profile = profile();
        profile.configure(ConnectionStrategy::ApiKeyViaCloud { api_key: "k3y".into() }).unwrap();

        assert_eq!(profile.headers()[AUTHORIZATION], "Bearer k3y");
        assert!(profile.headers()[AUTHORIZATION].is_sensitive());
        assert!(!profile.auto_redirect);
        assert!(profile.is_cloud());
        assert!(profile.authenticated);
    }

    #[test]
    fn jwt_via_proxy_needs_no_handshake_but_cloud_does() {
        let mut proxy = profile();
        proxy.configure(ConnectionStrategy::JwtTokenViaProxy { token: "jwt".into() }).unwrap();
        assert!(proxy.authenticated);
        assert!(proxy.auto_redirect);

        let mut cloud = profile();
        cloud.configure(ConnectionStrategy::JwtTokenViaCloud { token: "jwt".into() }).unwrap();
        assert!(!cloud.authenticated);
        assert!(matches!(cloud.handshake, Some(Handshake::JwtSession)));
        assert!(cloud.auto_redirect);
    }

    #[test]
    fn client_credentials_defers_to_token_handshake() {
        let mut profile = profile();
        profile
            .configure(ConnectionStrategy::ClientCredentialsViaCloud {
                client_id: "id".into(),
                client_secret: "secret".into(),
            })
            .unwrap();

        assert!(profile.headers().get(AUTHORIZATION).is_none());
        assert!(matches!(profile.handshake, Some(Handshake::ClientCredentials { .. })));
        assert!(!profile.auto_redirect);
    }

    #[test]
    fn existing_session_via_proxy_injects_cookie() {
        let mut profile = profile();
        profile
            .configure(ConnectionStrategy::ExistingSessionViaProxy {
                session_id: "abc".into(),
                cookie_name: "X-Qlik-Session".into(),
            })
            .unwrap();

        assert_eq!(profile.cookie("X-Qlik-Session").as_deref(), Some("abc"));
        assert!(profile.authenticated);
    }

    #[test]
    fn existing_session_via_cloud_injects_cookies_and_csrf_header() {
        let mut profile = profile();
        profile
            .configure(ConnectionStrategy::ExistingSessionViaCloud {
                session: SessionInfo {
                    eas_sid: Some("sid".into()),
                    eas_sid_sig: Some("sig".into()),
                    session_token: Some("csrf".into()),
                },
            })
            .unwrap();

        assert_eq!(profile.cookie(SESSION_COOKIE).as_deref(), Some("sid"));
        assert_eq!(profile.cookie(SESSION_SIGNATURE_COOKIE).as_deref(), Some("sig"));
        assert_eq!(profile.headers()[CSRF_TOKEN_HEADER], "csrf");
        assert!(profile.is_cloud());
    }

    #[test]
    fn debug_never_prints_secrets() {
        let strategy = ConnectionStrategy::ClientCredentialsViaCloud {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
        };
        assert!(!format!("{strategy:?}").contains("hunter2"));
        let strategy = ConnectionStrategy::ApiKeyViaCloud { api_key: "hunter2".into() };
        assert!(!format!("{strategy:?}").contains("hunter2"));
    }

    #[test]
    fn handshake_is_installed_exactly_for_modes_that_require_one() {
        let strategies = vec![
            ConnectionStrategy::DirectConnection {
                user_directory: "CORP".into(),
                user_id: "jane".into(),
                port: 4242,
                certificates: Some(certificates()),
            },
            ConnectionStrategy::NtlmUserViaProxy { credential: None },
            ConnectionStrategy::StaticHeaderUserViaProxy {
                user_id: "jane".into(),
                header_name: "X-Sense-User".into(),
            },
            ConnectionStrategy::AnonymousViaProxy,
            ConnectionStrategy::JwtTokenViaProxy { token: "jwt".into() },
            ConnectionStrategy::JwtTokenViaCloud { token: "jwt".into() },
            ConnectionStrategy::ApiKeyViaCloud { api_key: "key".into() },
            ConnectionStrategy::ClientCredentialsViaCloud {
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
            ConnectionStrategy::ExistingSessionViaProxy {
                session_id: "abc".into(),
                cookie_name: "X-Qlik-Session".into(),
            },
            ConnectionStrategy::ExistingSessionViaCloud {
                session: SessionInfo {
                    eas_sid: Some("sid".into()),
                    eas_sid_sig: Some("sig".into()),
                    session_token: None,
                },
            },
        ];
        assert_eq!(strategies.len(), 10);

        for strategy in strategies {
            let mode = strategy.connection_type();
            let mut profile = profile();
            profile.configure(strategy).unwrap();

            assert_eq!(profile.handshake.is_some(), mode.requires_handshake(), "{mode}");
            assert_eq!(profile.authenticated, !mode.requires_handshake(), "{mode}");
        }
    }
}

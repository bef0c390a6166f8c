//! Connection and identity types shared by every layer

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{SECURITY_CONTEXT_APP_ACCESS, SECURITY_CONTEXT_MANAGEMENT_ACCESS};
use crate::impl_tag_conversions;

/// How a client reaches the service and proves who it is
///
/// Exactly one mode is chosen per logical connection. A client starts out
/// `Undefined` and every call fails until one of the `as_*` methods has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    #[default]
    Undefined,
    DirectConnection,
    NtlmUserViaProxy,
    StaticHeaderUserViaProxy,
    AnonymousViaProxy,
    JwtTokenViaProxy,
    JwtTokenViaCloud,
    ApiKeyViaCloud,
    ClientCredentialsViaCloud,
    ExistingSessionViaProxy,
    ExistingSessionViaCloud,
}

impl_tag_conversions!(ConnectionType {
    Undefined => "undefined",
    DirectConnection => "direct_connection",
    NtlmUserViaProxy => "ntlm_user_via_proxy",
    StaticHeaderUserViaProxy => "static_header_user_via_proxy",
    AnonymousViaProxy => "anonymous_via_proxy",
    JwtTokenViaProxy => "jwt_token_via_proxy",
    JwtTokenViaCloud => "jwt_token_via_cloud",
    ApiKeyViaCloud => "api_key_via_cloud",
    ClientCredentialsViaCloud => "client_credentials_via_cloud",
    ExistingSessionViaProxy => "existing_session_via_proxy",
    ExistingSessionViaCloud => "existing_session_via_cloud",
});

impl ConnectionType {
    /// Whether calls carry the `xrfkey` query parameter and header.
    ///
    /// Cloud tenant modes use the CSRF header instead; mixing the two gets
    /// the request rejected.
    #[must_use]
    pub const fn uses_xrfkey(self) -> bool {
        !self.is_cloud()
    }

    /// Whether the mode targets a cloud tenant
    #[must_use]
    pub const fn is_cloud(self) -> bool {
        matches!(
            self,
            Self::JwtTokenViaCloud
                | Self::ApiKeyViaCloud
                | Self::ClientCredentialsViaCloud
                | Self::ExistingSessionViaCloud
        )
    }

    /// Whether the mode needs a handshake before the first data call
    #[must_use]
    pub const fn requires_handshake(self) -> bool {
        matches!(self, Self::NtlmUserViaProxy | Self::JwtTokenViaCloud | Self::ClientCredentialsViaCloud)
    }

    /// Whether the transport may follow redirects on its own
    #[must_use]
    pub const fn allows_auto_redirect(self) -> bool {
        !matches!(self, Self::ApiKeyViaCloud | Self::ClientCredentialsViaCloud)
    }
}

/// Identity the client acts as
///
/// `directory` is `None` when the final identity is decided by a virtual
/// proxy (static header, JWT). It is never guessed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userDirectory")]
    pub directory: Option<String>,
    #[serde(rename = "userId")]
    pub id: Option<String>,
}

impl User {
    /// Create a fully qualified user
    #[must_use]
    pub fn new(directory: impl Into<String>, id: impl Into<String>) -> Self {
        Self { directory: Some(directory.into()), id: Some(id.into()) }
    }

    /// User whose directory is resolved by the proxy
    #[must_use]
    pub fn with_unknown_directory(id: impl Into<String>) -> Self {
        Self { directory: None, id: Some(id.into()) }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\\{}",
            self.directory.as_deref().unwrap_or("<unknown>"),
            self.id.as_deref().unwrap_or("<unknown>")
        )
    }
}

/// Session material of an established cloud tenant session
///
/// Handed from one client to another to reuse a browser or service session
/// without a new handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub eas_sid: Option<String>,
    pub eas_sid_sig: Option<String>,
    pub session_token: Option<String>,
}

/// Access scope selected with the security-context header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityContext {
    /// Management console scope
    ManagementAccess,
    /// Hub / application scope
    AppAccess,
}

impl SecurityContext {
    /// Header value understood by the repository service
    #[must_use]
    pub const fn header_value(self) -> &'static str {
        match self {
            Self::ManagementAccess => SECURITY_CONTEXT_MANAGEMENT_ACCESS,
            Self::AppAccess => SECURITY_CONTEXT_APP_ACCESS,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn xrfkey_is_skipped_only_for_cloud_modes() {
        let cloud_modes = [
            ConnectionType::JwtTokenViaCloud,
            ConnectionType::ApiKeyViaCloud,
            ConnectionType::ClientCredentialsViaCloud,
            ConnectionType::ExistingSessionViaCloud,
        ];
        for mode in cloud_modes {
            assert!(!mode.uses_xrfkey(), "{mode} must not use xrfkey");
        }

        let xrfkey_modes = [
            ConnectionType::DirectConnection,
            ConnectionType::NtlmUserViaProxy,
            ConnectionType::StaticHeaderUserViaProxy,
            ConnectionType::AnonymousViaProxy,
            ConnectionType::JwtTokenViaProxy,
            ConnectionType::ExistingSessionViaProxy,
        ];
        for mode in xrfkey_modes {
            assert!(mode.uses_xrfkey(), "{mode} must use xrfkey");
        }
    }

    #[test]
    fn handshake_modes() {
        assert!(ConnectionType::NtlmUserViaProxy.requires_handshake());
        assert!(ConnectionType::JwtTokenViaCloud.requires_handshake());
        assert!(ConnectionType::ClientCredentialsViaCloud.requires_handshake());
        assert!(!ConnectionType::JwtTokenViaProxy.requires_handshake());
        assert!(!ConnectionType::ApiKeyViaCloud.requires_handshake());
    }

    #[test]
    fn connection_type_round_trips_through_str() {
        assert_eq!(ConnectionType::ApiKeyViaCloud.to_string(), "api_key_via_cloud");
        assert_eq!(
            ConnectionType::from_str("Direct_Connection").unwrap(),
            ConnectionType::DirectConnection
        );
        assert!(ConnectionType::from_str("carrier_pigeon").is_err());
    }

    #[test]
    fn user_display_marks_unknown_directory() {
        assert_eq!(User::new("INTERNAL", "sa_api").to_string(), "INTERNAL\\sa_api");
        assert_eq!(User::with_unknown_directory("jane").to_string(), "<unknown>\\jane");
    }

    #[test]
    fn user_deserializes_repository_field_names() {
        let user: User =
            serde_json::from_str(r#"{"userId":"jane","userDirectory":"CORP","name":"Jane"}"#)
                .unwrap();
        assert_eq!(user, User::new("CORP", "jane"));
    }

    #[test]
    fn session_info_uses_camel_case() {
        let info = SessionInfo {
            eas_sid: Some("sid".into()),
            eas_sid_sig: Some("sig".into()),
            session_token: Some("tok".into()),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["easSid"], "sid");
        assert_eq!(json["easSidSig"], "sig");
        assert_eq!(json["sessionToken"], "tok");
    }
}

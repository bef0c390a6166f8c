//! Protocol constants
//!
//! Header, cookie, parameter and endpoint names the remote service expects.
//! Casing and format are fixed by the service.

// Anti-CSRF key
pub const XRFKEY_PARAM: &str = "xrfkey";
pub const XRFKEY_HEADER: &str = "X-Qlik-Xrfkey";
pub const XRFKEY_LENGTH: usize = 16;

// Identity and scoping headers
pub const USER_HEADER: &str = "X-Qlik-User";
pub const SECURITY_HEADER: &str = "X-Qlik-Security";
pub const SECURITY_CONTEXT_MANAGEMENT_ACCESS: &str = "Context=ManagementAccess";
pub const SECURITY_CONTEXT_APP_ACCESS: &str = "Context=AppAccess";
pub const NTLM_USER_AGENT: &str = "Windows";

// Cloud tenant session
pub const CSRF_TOKEN_HEADER: &str = "qlik-csrf-token";
pub const CSRF_TOKEN_COOKIE: &str = "_csrfToken";
pub const SESSION_COOKIE: &str = "eas.sid";
pub const SESSION_SIGNATURE_COOKIE: &str = "eas.sid.sig";

// Handshake endpoints
pub const COOKIE_HANDSHAKE_ENDPOINT: &str = "/qrs/about";
pub const JWT_SESSION_ENDPOINT: &str = "/login/jwt-session";
pub const OAUTH_TOKEN_ENDPOINT: &str = "/oauth/token";
pub const CLIENT_CREDENTIALS_SCOPE: &str = "user_default";
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

// Repository endpoints used by the client factory
pub const USER_ENDPOINT: &str = "/qrs/user";
pub const RESET_RULE_CACHE_ENDPOINT: &str = "/qrs/systemrule/security/resetcache";
pub const ITEMS_ENDPOINT: &str = "/api/v1/items";

// Defaults
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_DIRECT_PORT: u16 = 4242;
pub const LIBRARY_IDENTIFIER: &str = "senserest";
pub const INTERNAL_DIRECTORY: &str = "INTERNAL";
pub const ADMIN_USER_ID: &str = "sa_api";
pub const MAX_PAGE_SIZE: u32 = 100;

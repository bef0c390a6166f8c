//! Client settings loaded from the environment or a settings file

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CONTENT_TYPE;

/// Settings applied to a freshly constructed client
///
/// Connection mode and credentials are deliberately absent: they are chosen
/// in code through the `as_*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Base address of the service (e.g. `https://sense.example.com`)
    pub url: String,
    /// Per-request timeout in seconds; `None` waits indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Proxy URL applied to every request
    #[serde(default)]
    pub proxy: Option<String>,
    /// Application identifier sent in addition to the library user agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Fixed anti-CSRF key (16 alphanumeric characters)
    #[serde(default)]
    pub xrfkey: Option<String>,
    /// Directory holding `client.pem`, `client_key.pem` and `root.pem`
    #[serde(default)]
    pub certificate_dir: Option<String>,
    /// Validate the server certificate
    #[serde(default = "default_true")]
    pub certificate_validation: bool,
    /// Content type for request bodies
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

impl ClientSettings {
    /// Settings for `url` with every other field at its default
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: None,
            proxy: None,
            user_agent: None,
            xrfkey: None,
            certificate_dir: None,
            certificate_validation: true,
            content_type: default_content_type(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

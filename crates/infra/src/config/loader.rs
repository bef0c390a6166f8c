//! Settings loader
//!
//! Loads [`ClientSettings`] from environment variables or a settings file.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `SENSEREST_URL` is unset, falls back to loading from file
//! 3. Probes the working directory and the executable's directory
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `SENSEREST_URL`: Base address of the service (required)
//! - `SENSEREST_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `SENSEREST_PROXY`: Proxy URL
//! - `SENSEREST_USER_AGENT`: Application identifier for the user agent
//! - `SENSEREST_XRFKEY`: Fixed anti-CSRF key
//! - `SENSEREST_CERT_DIR`: Directory holding the exported certificates
//! - `SENSEREST_CERT_VALIDATION`: Validate server certificates (true/false)
//! - `SENSEREST_CONTENT_TYPE`: Content type for request bodies

use std::path::{Path, PathBuf};

use senserest_domain::constants::DEFAULT_CONTENT_TYPE;
use senserest_domain::{ClientSettings, RestError, Result};

const SETTINGS_FILES: [&str; 2] = ["senserest.toml", "senserest.json"];

/// Load settings with automatic fallback strategy
///
/// # Errors
/// Returns `RestError::Config` if neither source yields valid settings.
pub fn load() -> Result<ClientSettings> {
    match load_from_env() {
        Ok(settings) => {
            tracing::info!("Settings loaded from environment variables");
            Ok(settings)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load settings from environment variables
///
/// Only `SENSEREST_URL` is required; everything else takes its default.
///
/// # Errors
/// Returns `RestError::Config` if `SENSEREST_URL` is missing or the
/// timeout is not a number.
pub fn load_from_env() -> Result<ClientSettings> {
    let url = env_var("SENSEREST_URL")?;
    let timeout_secs = std::env::var("SENSEREST_TIMEOUT_SECS")
        .ok()
        .map(|s| {
            s.parse::<u64>().map_err(|e| RestError::Config(format!("Invalid timeout: {e}")))
        })
        .transpose()?;

    Ok(ClientSettings {
        url,
        timeout_secs,
        proxy: std::env::var("SENSEREST_PROXY").ok(),
        user_agent: std::env::var("SENSEREST_USER_AGENT").ok(),
        xrfkey: std::env::var("SENSEREST_XRFKEY").ok(),
        certificate_dir: std::env::var("SENSEREST_CERT_DIR").ok(),
        certificate_validation: env_bool("SENSEREST_CERT_VALIDATION", true),
        content_type: std::env::var("SENSEREST_CONTENT_TYPE")
            .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string()),
    })
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_settings_paths`]. Format is chosen by file extension.
///
/// # Errors
/// Returns `RestError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientSettings> {
    let settings_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RestError::Config(format!(
                    "Settings file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_settings_paths().ok_or_else(|| {
            RestError::Config("No settings file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %settings_path.display(), "Loading settings from file");

    let contents = std::fs::read_to_string(&settings_path)
        .map_err(|e| RestError::Config(format!("Failed to read settings file: {e}")))?;

    parse_settings(&contents, &settings_path)
}

fn parse_settings(contents: &str, path: &Path) -> Result<ClientSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RestError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RestError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RestError::Config(format!("Unsupported settings format: {extension}"))),
    }
}

/// Probe the standard locations for a settings file
///
/// Searches the current working directory, then the executable's directory,
/// for `senserest.toml` and `senserest.json`.
///
/// # Returns
/// The first settings file found, or `None` if no file exists.
pub fn probe_settings_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| SETTINGS_FILES.iter().map(move |file| dir.join(file)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| RestError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::Builder;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 8] = [
        "SENSEREST_URL",
        "SENSEREST_TIMEOUT_SECS",
        "SENSEREST_PROXY",
        "SENSEREST_USER_AGENT",
        "SENSEREST_XRFKEY",
        "SENSEREST_CERT_DIR",
        "SENSEREST_CERT_VALIDATION",
        "SENSEREST_CONTENT_TYPE",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "YES", "on"] {
            std::env::set_var("SENSEREST_TEST_BOOL", value);
            assert!(env_bool("SENSEREST_TEST_BOOL", false), "{value} should be true");
        }
        for value in ["0", "false", "no", "off", "garbage"] {
            std::env::set_var("SENSEREST_TEST_BOOL", value);
            assert!(!env_bool("SENSEREST_TEST_BOOL", true), "{value} should be false");
        }

        std::env::remove_var("SENSEREST_TEST_BOOL");
        assert!(env_bool("SENSEREST_TEST_BOOL", true));
        assert!(!env_bool("SENSEREST_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("SENSEREST_URL", "https://sense.example.com");
        std::env::set_var("SENSEREST_TIMEOUT_SECS", "30");
        std::env::set_var("SENSEREST_PROXY", "http://proxy.example.com:3128");
        std::env::set_var("SENSEREST_USER_AGENT", "reporting-tool");
        std::env::set_var("SENSEREST_XRFKEY", "ABCDEFGHIJKLMNOP");
        std::env::set_var("SENSEREST_CERT_DIR", "/etc/senserest/certs");
        std::env::set_var("SENSEREST_CERT_VALIDATION", "false");
        std::env::set_var("SENSEREST_CONTENT_TYPE", "text/plain");

        let settings = load_from_env();
        clear_env();

        let settings = settings.expect("settings should load from env");
        assert_eq!(settings.url, "https://sense.example.com");
        assert_eq!(settings.timeout_secs, Some(30));
        assert_eq!(settings.proxy.as_deref(), Some("http://proxy.example.com:3128"));
        assert_eq!(settings.user_agent.as_deref(), Some("reporting-tool"));
        assert_eq!(settings.xrfkey.as_deref(), Some("ABCDEFGHIJKLMNOP"));
        assert_eq!(settings.certificate_dir.as_deref(), Some("/etc/senserest/certs"));
        assert!(!settings.certificate_validation);
        assert_eq!(settings.content_type, "text/plain");
    }

    #[test]
    fn test_load_from_env_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("SENSEREST_URL", "https://sense.example.com");

        let settings = load_from_env();
        clear_env();

        assert_eq!(settings.unwrap(), ClientSettings::new("https://sense.example.com"));
    }

    #[test]
    fn test_load_from_env_missing_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, RestError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_timeout() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("SENSEREST_URL", "https://sense.example.com");
        std::env::set_var("SENSEREST_TIMEOUT_SECS", "soon");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(RestError::Config(_))));
    }

    #[test]
    fn test_load_from_file_json() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"url":"https://tenant.example.com","timeout_secs":5}}"#).unwrap();

        let settings = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.url, "https://tenant.example.com");
        assert_eq!(settings.timeout_secs, Some(5));
        assert!(settings.certificate_validation);
    }

    #[test]
    fn test_load_from_file_toml() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "url = \"https://sense.example.com\"").unwrap();
        writeln!(file, "certificate_dir = \"certs\"").unwrap();
        writeln!(file, "certificate_validation = false").unwrap();

        let settings = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.certificate_dir.as_deref(), Some("certs"));
        assert!(!settings.certificate_validation);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/senserest.toml"))).unwrap_err();
        assert!(matches!(err, RestError::Config(_)));
    }

    #[test]
    fn test_parse_unsupported_format() {
        let err = parse_settings("url: x", Path::new("senserest.yaml")).unwrap_err();
        assert!(matches!(err, RestError::Config(_)));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_settings("{not json", Path::new("senserest.json")).unwrap_err();
        assert!(matches!(err, RestError::Config(_)));
    }
}

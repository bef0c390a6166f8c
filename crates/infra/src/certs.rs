//! Client certificate material for direct connections
//!
//! The repository service exports `client.pem`, `client_key.pem` and
//! `root.pem`. The set is immutable once loaded and shared by every client
//! built from it.

use std::fmt;
use std::path::{Path, PathBuf};

use senserest_domain::{RestError, Result};
use tracing::debug;

pub const CLIENT_CERT_FILE: &str = "client.pem";
pub const CLIENT_KEY_FILE: &str = "client_key.pem";
pub const ROOT_CERT_FILE: &str = "root.pem";

/// Client identity plus an optional root certificate to trust
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateSet {
    identity_pem: Vec<u8>,
    root_pem: Option<Vec<u8>>,
}

impl CertificateSet {
    /// Load the exported certificate files from `dir`
    ///
    /// # Errors
    ///
    /// [`RestError::CertificatesNotLoaded`] when the directory or either
    /// client file is missing; [`RestError::InvalidArgument`] when a file is
    /// not valid PEM.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "certificate directory not found");
            return Err(RestError::CertificatesNotLoaded);
        }

        let cert = read_required(dir.join(CLIENT_CERT_FILE))?;
        let key = read_required(dir.join(CLIENT_KEY_FILE))?;
        let set = Self::from_pem(&cert, &key)?;

        let root_path = dir.join(ROOT_CERT_FILE);
        if root_path.is_file() {
            let root = std::fs::read(&root_path).map_err(|err| {
                RestError::InvalidArgument(format!("cannot read {}: {err}", root_path.display()))
            })?;
            return set.with_root(root);
        }

        Ok(set)
    }

    /// Build from in-memory PEM data
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] when the certificate or key is not
    /// parseable.
    pub fn from_pem(cert: &[u8], key: &[u8]) -> Result<Self> {
        let mut identity_pem = Vec::with_capacity(cert.len() + key.len() + 1);
        identity_pem.extend_from_slice(key);
        if !key.ends_with(b"\n") {
            identity_pem.push(b'\n');
        }
        identity_pem.extend_from_slice(cert);

        reqwest::Identity::from_pem(&identity_pem).map_err(|err| {
            RestError::InvalidArgument(format!("invalid client certificate: {err}"))
        })?;

        Ok(Self { identity_pem, root_pem: None })
    }

    /// Trust `root` in addition to the system roots
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] when `root` is not a PEM certificate.
    pub fn with_root(mut self, root: Vec<u8>) -> Result<Self> {
        reqwest::Certificate::from_pem(&root).map_err(|err| {
            RestError::InvalidArgument(format!("invalid root certificate: {err}"))
        })?;
        self.root_pem = Some(root);
        Ok(self)
    }

    pub(crate) fn identity_pem(&self) -> &[u8] {
        &self.identity_pem
    }

    pub(crate) fn root_pem(&self) -> Option<&[u8]> {
        self.root_pem.as_deref()
    }
}

impl fmt::Debug for CertificateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateSet")
            .field("identity", &"<redacted>")
            .field("has_root", &self.root_pem.is_some())
            .finish()
    }
}

fn read_required(path: PathBuf) -> Result<Vec<u8>> {
    std::fs::read(&path).map_err(|err| {
        debug!(path = %path.display(), error = %err, "certificate file not readable");
        RestError::CertificatesNotLoaded
    })
}

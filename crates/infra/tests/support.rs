#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};

use senserest_core::ports::{AuthEvent, ClientObserver, ResponseSummary};
use senserest_infra::CertificateSet;
use wiremock::MockServer;

pub const XRFKEY: &str = "ABCDEFGHIJKLMNOP";

/// Install a test subscriber once; set `RUST_LOG` to see client logs.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/certs")
}

pub fn certificates() -> CertificateSet {
    CertificateSet::from_directory(fixtures_dir()).expect("fixture certificates should load")
}

/// Every request the server saw, in arrival order
pub async fn requests(server: &MockServer) -> Vec<wiremock::Request> {
    server.received_requests().await.expect("request recording should be enabled")
}

pub fn header<'a>(request: &'a wiremock::Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|value| value.to_str().ok())
}

pub fn query_value(request: &wiremock::Request, key: &str) -> Option<String> {
    request.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}

/// Observer that keeps a line per hook invocation
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("observer mutex poisoned").clone()
    }

    fn push(&self, event: String) {
        self.events.lock().expect("observer mutex poisoned").push(event);
    }
}

impl ClientObserver for RecordingObserver {
    fn on_call(&self, method: &str, endpoint: &str) {
        self.push(format!("call {method} {endpoint}"));
    }

    fn on_response(&self, summary: &ResponseSummary<'_>) {
        self.push(format!("response {} {} {}", summary.method, summary.url, summary.status));
    }

    fn on_authentication(&self, event: &AuthEvent<'_>) {
        let line = match event {
            AuthEvent::Started { procedure } => format!("auth started {procedure}"),
            AuthEvent::Succeeded { procedure } => format!("auth succeeded {procedure}"),
            AuthEvent::Failed { procedure, .. } => format!("auth failed {procedure}"),
            AuthEvent::Replayed { .. } => "auth replayed".to_string(),
        };
        self.push(line);
    }
}

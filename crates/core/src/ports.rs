//! Port interfaces between the coordinator and the transport layer
//!
//! The coordinator never talks HTTP itself. A connection mode that needs a
//! handshake hands it an [`AuthProcedure`]; everything worth reporting is
//! pushed through an injected [`ClientObserver`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use senserest_domain::{RestError, Result};
use tracing::{debug, info, warn};

/// One authentication handshake, run at most once per coordinator
///
/// Implementations write the session artifacts they obtain (cookies, CSRF
/// token, bearer token) before returning `Ok`.
#[async_trait]
pub trait AuthProcedure: Send + Sync {
    /// Short name used in logs and observer events
    fn name(&self) -> &'static str;

    /// Perform the handshake
    async fn authenticate(&self) -> Result<()>;
}

/// Progress of an authentication attempt
#[derive(Debug, Clone, Copy)]
pub enum AuthEvent<'a> {
    Started { procedure: &'a str },
    Succeeded { procedure: &'a str },
    Failed { procedure: &'a str, cause: &'a RestError },
    /// A caller received the cached failure without a new attempt
    Replayed { cause: &'a RestError },
}

/// Outcome of a single HTTP exchange
#[derive(Debug, Clone, Copy)]
pub struct ResponseSummary<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub status: u16,
    pub elapsed: Duration,
}

impl fmt::Display for ResponseSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {} in {}ms", self.method, self.url, self.status, self.elapsed.as_millis())
    }
}

/// Receives client diagnostics
///
/// Passed to a client at construction time; derived clients inherit the
/// parent's observer. Every hook has an empty default body.
pub trait ClientObserver: Send + Sync {
    /// A call is about to be issued
    fn on_call(&self, _method: &str, _endpoint: &str) {}

    /// A response arrived (any status)
    fn on_response(&self, _summary: &ResponseSummary<'_>) {}

    /// The coordinator changed state
    fn on_authentication(&self, _event: &AuthEvent<'_>) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ClientObserver for NoopObserver {}

/// Observer that forwards every hook to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ClientObserver for TracingObserver {
    fn on_call(&self, method: &str, endpoint: &str) {
        debug!(method, endpoint, "Issuing call");
    }

    fn on_response(&self, summary: &ResponseSummary<'_>) {
        debug!(
            method = summary.method,
            url = summary.url,
            status = summary.status,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Response received"
        );
    }

    fn on_authentication(&self, event: &AuthEvent<'_>) {
        match event {
            AuthEvent::Started { procedure } => debug!(procedure, "Authentication started"),
            AuthEvent::Succeeded { procedure } => info!(procedure, "Authentication succeeded"),
            AuthEvent::Failed { procedure, cause } => {
                warn!(procedure, error = %cause, "Authentication failed");
            }
            AuthEvent::Replayed { cause } => {
                debug!(error = %cause, "Replaying cached authentication failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_summary_display() {
        let summary = ResponseSummary {
            method: "GET",
            url: "https://sense.example/qrs/about",
            status: 200,
            elapsed: Duration::from_millis(12),
        };
        assert_eq!(summary.to_string(), "GET https://sense.example/qrs/about -> 200 in 12ms");
    }

    #[test]
    fn default_hooks_are_callable_through_trait_objects() {
        let observers: Vec<Box<dyn ClientObserver>> = vec![Box::new(NoopObserver), Box::new(TracingObserver)];
        let cause = RestError::Protocol("missing cookie".into());
        for observer in &observers {
            observer.on_call("GET", "/qrs/about");
            observer.on_authentication(&AuthEvent::Failed { procedure: "cookie", cause: &cause });
        }
    }
}

//! Authentication coordinator
//!
//! Runs a connection's handshake at most once, no matter how many requests
//! race for it, and replays the outcome to every later caller.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use senserest_domain::{RestError, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::ports::{AuthEvent, AuthProcedure, ClientObserver, NoopObserver};

/// Observable state of an [`AuthCoordinator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    /// Terminal
    Authenticated,
    /// Terminal and sticky
    Failed,
}

/// Outcome slots written by the handshake task
///
/// `authenticated` only ever goes from `false` to `true` and `failure` is
/// write-once, so a reader that sees either has seen a settled handshake.
#[derive(Default)]
struct Session {
    authenticated: AtomicBool,
    in_flight: AtomicBool,
    failure: OnceLock<Arc<RestError>>,
}

impl Session {
    fn fail(&self, err: RestError) -> Arc<RestError> {
        Arc::clone(self.failure.get_or_init(|| Arc::new(err)))
    }
}

/// Single-flight guard around an [`AuthProcedure`]
///
/// The procedure runs on its own task, so a caller that is cancelled while
/// waiting only abandons its wait. The gate holds the task handle until some
/// caller observes it finish.
pub struct AuthCoordinator {
    session: Arc<Session>,
    gate: Mutex<Option<JoinHandle<()>>>,
    procedure: Option<Arc<dyn AuthProcedure>>,
    observer: Arc<dyn ClientObserver>,
}

impl AuthCoordinator {
    /// Coordinator that will run `procedure` on first use
    pub fn new(procedure: Arc<dyn AuthProcedure>) -> Self {
        Self::build(false, Some(procedure))
    }

    /// Coordinator for modes that need no handshake
    #[must_use]
    pub fn authenticated() -> Self {
        Self::build(true, None)
    }

    /// Coordinator for a derived client
    ///
    /// Starts authenticated when the parent already was; otherwise it will
    /// run `procedure` independently of the parent.
    pub fn seeded(authenticated: bool, procedure: Option<Arc<dyn AuthProcedure>>) -> Self {
        Self::build(authenticated || procedure.is_none(), procedure)
    }

    fn build(authenticated: bool, procedure: Option<Arc<dyn AuthProcedure>>) -> Self {
        Self {
            session: Arc::new(Session {
                authenticated: AtomicBool::new(authenticated),
                ..Session::default()
            }),
            gate: Mutex::new(None),
            procedure,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Report state changes to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Start out failed with `cause`, replaying it instead of handshaking
    ///
    /// Used when a client rebuilds its connection after the handshake has
    /// already failed.
    #[must_use]
    pub fn with_failure(self, cause: Arc<RestError>) -> Self {
        if !self.session.authenticated.load(Ordering::Acquire) {
            let _ = self.session.failure.set(cause);
        }
        self
    }

    /// Make sure the handshake has succeeded, running it if nobody has yet
    ///
    /// Callers arriving while a handshake is in flight wait for it and then
    /// share its outcome. Dropping this future does not stop the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::AuthenticationFailed`] wrapping the cached cause
    /// when the handshake failed, now or on an earlier call.
    #[instrument(skip(self), level = "debug")]
    pub async fn ensure_authenticated(&self) -> Result<()> {
        if self.session.authenticated.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut handshake = self.gate.lock().await;

        if self.session.authenticated.load(Ordering::Acquire) {
            return Ok(());
        }

        if handshake.is_none() {
            if let Some(cause) = self.session.failure.get() {
                self.observer.on_authentication(&AuthEvent::Replayed { cause: &**cause });
                return Err(RestError::AuthenticationFailed(Arc::clone(cause)));
            }

            let Some(procedure) = self.procedure.as_ref() else {
                self.session.authenticated.store(true, Ordering::Release);
                return Ok(());
            };

            *handshake = Some(self.spawn(Arc::clone(procedure)));
        }

        if let Some(task) = handshake.as_mut() {
            let joined = task.await;
            *handshake = None;
            if let Err(err) = joined {
                warn!(error = %err, "Authentication task did not finish");
                self.session.fail(RestError::Protocol(format!("authentication task aborted: {err}")));
            }
        }

        if self.session.authenticated.load(Ordering::Acquire) {
            return Ok(());
        }
        let cause = match self.session.failure.get() {
            Some(cause) => Arc::clone(cause),
            None => self.session.fail(RestError::Protocol("handshake ended without an outcome".into())),
        };
        Err(RestError::AuthenticationFailed(cause))
    }

    fn spawn(&self, procedure: Arc<dyn AuthProcedure>) -> JoinHandle<()> {
        let name = procedure.name();
        debug!(procedure = name, "Running authentication procedure");
        self.observer.on_authentication(&AuthEvent::Started { procedure: name });

        let in_flight = InFlight::enter(Arc::clone(&self.session));
        let session = Arc::clone(&self.session);
        let observer = Arc::clone(&self.observer);

        tokio::spawn(async move {
            let _in_flight = in_flight;
            match procedure.authenticate().await {
                Ok(()) => {
                    session.authenticated.store(true, Ordering::Release);
                    observer.on_authentication(&AuthEvent::Succeeded { procedure: name });
                }
                Err(err) => {
                    let cause = session.fail(err);
                    observer
                        .on_authentication(&AuthEvent::Failed { procedure: name, cause: &*cause });
                }
            }
        })
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.authenticated.load(Ordering::Acquire)
    }

    /// The cached handshake failure, if any
    #[must_use]
    pub fn failure(&self) -> Option<Arc<RestError>> {
        self.session.failure.get().cloned()
    }

    /// The procedure this coordinator runs, for building a derived client
    #[must_use]
    pub fn procedure(&self) -> Option<Arc<dyn AuthProcedure>> {
        self.procedure.clone()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        if self.session.authenticated.load(Ordering::Acquire) {
            AuthState::Authenticated
        } else if self.session.failure.get().is_some() {
            AuthState::Failed
        } else if self.session.in_flight.load(Ordering::Acquire) {
            AuthState::Authenticating
        } else {
            AuthState::Unauthenticated
        }
    }
}

impl fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("state", &self.state())
            .field("procedure", &self.procedure.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight marker when the handshake task ends, even by panic
struct InFlight(Arc<Session>);

impl InFlight {
    fn enter(session: Arc<Session>) -> Self {
        session.in_flight.store(true, Ordering::Release);
        Self(session)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

//! Client-side session manager for the Growth backend.
//!
//! One [`SessionManager`] is built at process start and cloned into every
//! consumer. It owns the session state, the transport, and the refresh
//! coordinator.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use growth_session::{ClientConfig, SessionManager};
//!
//! // 1. Configure from environment and build the manager once
//! let session = SessionManager::new(ClientConfig::from_env()?)?;
//!
//! // 2. Resolve any existing session before rendering protected views
//! session.bootstrap().await;
//!
//! // 3. React to auth changes
//! let _sub = session.on_state_change(|state| {
//!     tracing::info!(signed_in = state.is_authenticated(), "auth changed");
//! });
//!
//! // 4. Sign in: send the user to `redirect.url`, then complete on callback
//! let redirect = session.login().await?;
//! let user = session.complete_login_from_query(callback_query).await?;
//! ```

mod api;
mod bootstrap;
mod guard;
mod profile;
mod refresh;
mod store;

use std::sync::Arc;

use tokio::sync::{OnceCell, watch};

pub use guard::{GuardDecision, RouteGuard};
pub use store::{SessionPhase, SessionState, Subscription};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::token::AccessToken;
use crate::transport::{ApiRequest, TokenSource, Transport};
use crate::wire::RefreshResponse;
use refresh::{RefreshCoordinator, RefreshOutcome, Role};
use store::SessionStore;

/// Recorded as `last_error` when a signed-in session cannot be refreshed.
pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

/// Authentication session manager.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) transport: Transport,
    pub(crate) store: SessionStore,
    refresh: RefreshCoordinator,
    bootstrapped: OnceCell<()>,
}

impl SessionManager {
    /// Create a manager with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Ok(Self::from_transport(Transport::new(config)?))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    /// It must have a cookie store enabled.
    #[must_use]
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self::from_transport(Transport::with_http_client(config, http))
    }

    fn from_transport(transport: Transport) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store: SessionStore::new(),
                refresh: RefreshCoordinator::default(),
                bootstrapped: OnceCell::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.inner.transport.config()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.store.snapshot()
    }

    /// Async view of the state, for consumers that prefer `watch` over callbacks.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.store.subscribe()
    }

    /// Registers `listener` for every state change until the returned
    /// [`Subscription`] is dropped.
    pub fn on_state_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.inner.store.on_change(listener)
    }

    /// Resolves once bootstrap has completed, with the state at that point.
    pub async fn wait_until_initialized(&self) -> SessionState {
        let mut rx = self.inner.store.subscribe();
        let initialized = rx
            .wait_for(SessionState::is_initialized)
            .await
            .map(|state| state.clone());
        initialized.unwrap_or_else(|_| self.state())
    }

    /// Route guard configured with this manager's login and landing paths.
    #[must_use]
    pub fn route_guard(&self) -> RouteGuard {
        let config = self.config();
        RouteGuard::new(config.login_path(), config.landing_path())
    }

    /// Returns a freshly minted access token.
    ///
    /// Concurrent callers share one network refresh. On failure the session
    /// is signed out before the error is returned.
    ///
    /// # Errors
    ///
    /// [`Error::RefreshFailure`] if the backend refused or could not be
    /// reached, [`Error::SignedOut`] if a logout raced the refresh.
    pub async fn refresh(&self) -> Result<AccessToken, Error> {
        self.inner.ensure_fresh_token().await
    }

    /// Runs `request` through the retry interceptor.
    pub(crate) async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, Error> {
        self.inner.transport.execute(&self.inner, request).await
    }
}

impl Inner {
    pub(crate) async fn ensure_fresh_token(self: &Arc<Self>) -> Result<AccessToken, Error> {
        let (role, rx) = self.refresh.join();
        if let Role::Issuer = role {
            // must settle even if every caller is dropped
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run_refresh().await });
        }
        match rx.await {
            Ok(outcome) => outcome.into_result(),
            Err(_) => Err(Error::RefreshFailure("refresh task ended unexpectedly".into())),
        }
    }

    async fn run_refresh(&self) {
        let epoch = self.store.epoch();
        let outcome = match self.request_refresh().await {
            Ok(RefreshResponse { tokens, user, .. }) => {
                let token = tokens.access_token;
                if self.store.install_refreshed(token.clone(), user, epoch) {
                    tracing::debug!("access token refreshed");
                    RefreshOutcome::Fresh(token)
                } else {
                    tracing::debug!("session signed out during refresh, discarding token");
                    RefreshOutcome::Discarded
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, signing out");
                if self.store.expire(epoch, SESSION_EXPIRED) {
                    self.transport.clear_csrf().await;
                }
                RefreshOutcome::Failed(e.to_string())
            }
        };
        let released = self.refresh.settle(&outcome);
        tracing::trace!(released, "refresh settled");
    }

    /// The refresh call. Internal: no automatic CSRF or retry, but the CSRF
    /// token is attached explicitly; the refresh credential is the cookie.
    async fn request_refresh(&self) -> Result<RefreshResponse, Error> {
        let csrf = self.transport.csrf_token().await?;
        let request = ApiRequest::post(&self.transport.config().endpoints.refresh).internal();
        let response = self.transport.send(&request, None, Some(&csrf)).await?;
        let response = Transport::ensure_success(response).await?;
        Transport::read_json(response).await
    }
}

impl TokenSource for Arc<Inner> {
    fn current_token(&self) -> Option<AccessToken> {
        self.store.access_token()
    }

    async fn fresh_token(&self) -> Result<AccessToken, Error> {
        self.ensure_fresh_token().await
    }
}

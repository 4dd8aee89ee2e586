use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

use crate::token::AccessToken;
use crate::types::User;

/// Lifecycle of a session manager.
///
/// `Uninitialized → Initializing → {Authenticated, Anonymous}`; after
/// bootstrap only `Authenticated ⇄ Anonymous` transitions happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    phase: SessionPhase,
    user: Option<User>,
    access_token: Option<AccessToken>,
    last_error: Option<String>,
    pending: u32,
    epoch: u64,
}

impl SessionState {
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Always equal to `user().is_some()`.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// An auth operation (bootstrap, sign-in, sign-out, profile update) is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }

    /// Bootstrap has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Authenticated | SessionPhase::Anonymous
        )
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Post-bootstrap phase follows the user.
    fn sync_phase(&mut self) {
        if self.is_initialized() {
            self.phase = if self.user.is_some() {
                SessionPhase::Authenticated
            } else {
                SessionPhase::Anonymous
            };
        }
    }

    fn clear(&mut self) {
        self.user = None;
        self.access_token = None;
        self.epoch += 1;
        self.sync_phase();
    }
}

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle returned by [`SessionManager::on_state_change`](super::SessionManager::on_state_change).
///
/// The listener is removed when this is dropped or [`unsubscribe`](Self::unsubscribe)d.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Removes the listener now. Same as dropping the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            if let Ok(mut listeners) = listeners.lock() {
                listeners.entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

/// Process-wide session state. Every mutation goes through one of the
/// actions below; observers are notified after each effective change.
pub(crate) struct SessionStore {
    state: watch::Sender<SessionState>,
    listeners: Arc<Mutex<Listeners>>,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::Sender::new(SessionState::default()),
            listeners: Arc::default(),
        }
    }

    pub(crate) fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub(crate) fn access_token(&self) -> Option<AccessToken> {
        self.state.borrow().access_token.clone()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Applies `action`; notifies observers when it reports a change.
    fn update(&self, action: impl FnOnce(&mut SessionState) -> bool) -> bool {
        if !self.state.send_if_modified(action) {
            return false;
        }
        let snapshot = self.snapshot();
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
        true
    }

    /// Marks an operation as running until the guard is dropped.
    pub(crate) fn loading(&self) -> LoadingGuard<'_> {
        self.update(|s| {
            s.pending += 1;
            s.pending == 1
        });
        LoadingGuard { store: self }
    }

    /// Enters `Initializing`. Only the first call has an effect.
    pub(crate) fn begin_bootstrap(&self) -> bool {
        self.update(|s| {
            if s.phase != SessionPhase::Uninitialized {
                return false;
            }
            s.phase = SessionPhase::Initializing;
            true
        })
    }

    /// Leaves `Initializing` with whatever session was found.
    pub(crate) fn finish_bootstrap(&self, user: Option<User>) -> bool {
        self.update(|s| {
            if s.phase != SessionPhase::Initializing {
                return false;
            }
            s.phase = SessionPhase::Anonymous;
            match user {
                Some(user) => s.user = Some(user),
                None => s.clear(),
            }
            s.last_error = None;
            s.sync_phase();
            true
        })
    }

    /// Installs the outcome of a successful sign-in. Starts a new epoch, so
    /// refreshes begun before the sign-in can no longer touch the session.
    pub(crate) fn authenticate(&self, user: User, token: AccessToken) {
        self.update(|s| {
            s.epoch += 1;
            s.user = Some(user);
            s.access_token = Some(token);
            s.last_error = None;
            if s.phase != SessionPhase::Initializing {
                s.phase = SessionPhase::Authenticated;
            }
            true
        });
    }

    /// Installs a refreshed token, unless the session was signed in or out
    /// since `epoch` was read.
    pub(crate) fn install_refreshed(
        &self,
        token: AccessToken,
        user: Option<User>,
        epoch: u64,
    ) -> bool {
        let mut installed = false;
        self.update(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.access_token = Some(token);
            if let Some(user) = user {
                s.user = Some(user);
            }
            s.sync_phase();
            installed = true;
            true
        });
        installed
    }

    /// Replaces the user record wholesale, unless the session was signed in
    /// or out since `epoch` was read.
    pub(crate) fn replace_user(&self, user: User, epoch: u64) -> bool {
        self.update(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.user = Some(user);
            s.last_error = None;
            s.sync_phase();
            true
        })
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| {
            s.last_error = Some(message);
            true
        });
    }

    /// Clears user and token. `reason`, when given, becomes `last_error`.
    pub(crate) fn sign_out(&self, reason: Option<String>) {
        self.update(|s| {
            s.clear();
            s.last_error = reason;
            true
        });
    }

    /// Sign-out after a definitive refresh failure. Does nothing if the
    /// session was signed in or out since `epoch` was read. `reason` is only
    /// recorded when a user had been signed in.
    pub(crate) fn expire(&self, epoch: u64, reason: &str) -> bool {
        self.update(|s| {
            if s.epoch != epoch {
                return false;
            }
            let was_signed_in = s.user.is_some();
            s.clear();
            if was_signed_in {
                s.last_error = Some(reason.to_string());
            }
            true
        })
    }
}

pub(crate) struct LoadingGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.update(|s| {
            s.pending = s.pending.saturating_sub(1);
            s.pending == 0
        });
    }
}

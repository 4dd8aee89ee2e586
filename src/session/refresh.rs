use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::Error;
use crate::token::AccessToken;

/// How a refresh settled, as delivered to every waiter.
#[derive(Debug, Clone)]
pub(crate) enum RefreshOutcome {
    Fresh(AccessToken),
    Failed(String),
    /// The session was signed out while the refresh was in flight; its
    /// result was dropped.
    Discarded,
}

impl RefreshOutcome {
    pub(crate) fn into_result(self) -> Result<AccessToken, Error> {
        match self {
            Self::Fresh(token) => Ok(token),
            Self::Failed(reason) => Err(Error::RefreshFailure(reason)),
            Self::Discarded => Err(Error::SignedOut),
        }
    }
}

type Waiter = oneshot::Sender<RefreshOutcome>;

#[derive(Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        waiters: VecDeque<Waiter>,
    },
}

/// Whether the caller of [`RefreshCoordinator::join`] has to start the refresh.
pub(crate) enum Role {
    Issuer,
    Waiter,
}

/// Single-flight gate for token refreshes.
///
/// The first caller while idle becomes the issuer and starts the network
/// call; everyone who arrives before it settles is queued behind it. The
/// network call itself lives in the session manager.
#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Queues the caller on the current refresh, opening one if idle.
    pub(crate) fn join(&self) -> (Role, oneshot::Receiver<RefreshOutcome>) {
        let (tx, rx) = oneshot::channel();
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match &mut *state {
            RefreshState::Refreshing { waiters } => {
                waiters.push_back(tx);
                tracing::trace!(queued = waiters.len(), "joined in-flight refresh");
                (Role::Waiter, rx)
            }
            RefreshState::Idle => {
                *state = RefreshState::Refreshing {
                    waiters: VecDeque::from([tx]),
                };
                (Role::Issuer, rx)
            }
        }
    }

    /// Returns to idle, then releases every queued caller in arrival order.
    pub(crate) fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let previous = std::mem::take(
            &mut *self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        let RefreshState::Refreshing { waiters } = previous else {
            return 0;
        };
        let released = waiters.len();
        for waiter in waiters {
            // a caller that gave up waiting is fine to skip
            let _ = waiter.send(outcome.clone());
        }
        released
    }

    #[cfg(test)]
    fn is_refreshing(&self) -> bool {
        matches!(
            *self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
            RefreshState::Refreshing { .. }
        )
    }
}

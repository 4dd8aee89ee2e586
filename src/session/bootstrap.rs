use std::sync::Arc;

use super::{Inner, SessionManager};
use crate::error::Error;
use crate::types::User;

impl SessionManager {
    /// One-time startup check for an existing session.
    ///
    /// Uses the refresh cookie to mint an access token and loads the user.
    /// Safe to call any number of times, concurrently: every caller awaits
    /// the same single run. Never fails; an unreachable backend or a missing
    /// session both end in the anonymous state.
    pub async fn bootstrap(&self) {
        self.inner
            .bootstrapped
            .get_or_init(|| self.inner.run_bootstrap())
            .await;
    }
}

impl Inner {
    async fn run_bootstrap(self: &Arc<Self>) {
        self.store.begin_bootstrap();
        let _loading = self.store.loading();

        let user = match self.resolve_existing_session().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "restored existing session");
                Some(user)
            }
            Err(e) => {
                tracing::debug!(error = %e, "no existing session");
                None
            }
        };
        self.store.finish_bootstrap(user);
    }

    async fn resolve_existing_session(self: &Arc<Self>) -> Result<User, Error> {
        self.ensure_fresh_token().await?;
        if let Some(user) = self.store.snapshot().user().cloned() {
            return Ok(user);
        }
        self.load_profile().await
    }
}

use std::sync::Arc;

use super::{Inner, SessionManager};
use crate::error::Error;
use crate::transport::{ApiRequest, Transport};
use crate::types::{ProfileUpdate, User};
use crate::wire::ProfileResponse;

impl SessionManager {
    /// Reloads the current user from the backend.
    ///
    /// # Errors
    ///
    /// Transport errors, [`Error::Validation`] for a malformed user, or
    /// [`Error::SignedOut`] if a logout happened meanwhile.
    pub async fn fetch_profile(&self) -> Result<User, Error> {
        self.inner.load_profile().await
    }

    /// Updates the user's name and picture.
    ///
    /// Not optimistic: the stored user changes only once the backend has
    /// accepted the update and returned a valid user. On failure the session
    /// state is left as it was.
    ///
    /// # Errors
    ///
    /// [`Error::ProfileUpdate`] wrapping the cause.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, Error> {
        let _loading = self.inner.store.loading();
        let epoch = self.inner.store.epoch();

        let user = self.submit_profile(update).await.map_err(|e| {
            tracing::warn!(error = %e, "profile update failed");
            Error::ProfileUpdate(Box::new(e))
        })?;

        if !self.inner.store.replace_user(user.clone(), epoch) {
            return Err(Error::ProfileUpdate(Box::new(Error::SignedOut)));
        }
        tracing::info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    async fn submit_profile(&self, update: &ProfileUpdate) -> Result<User, Error> {
        let request = ApiRequest::put(&self.config().endpoints.profile).with_json(update)?;
        let response = self.execute(&request).await?;
        let body: ProfileResponse = Transport::read_json(response).await?;
        Ok(body.user)
    }
}

impl Inner {
    pub(super) async fn load_profile(self: &Arc<Self>) -> Result<User, Error> {
        let epoch = self.store.epoch();
        let request = ApiRequest::get(&self.transport.config().endpoints.profile);
        let response = self.transport.execute(self, &request).await?;
        let body: ProfileResponse = Transport::read_json(response).await?;

        if !self.store.replace_user(body.user.clone(), epoch) {
            return Err(Error::SignedOut);
        }
        Ok(body.user)
    }
}

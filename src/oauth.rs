use url::Url;

use crate::config::CodeExchange;
use crate::error::Error;
use crate::session::SessionManager;
use crate::transport::{ApiRequest, Transport};
use crate::types::User;
use crate::wire::{AuthResult, AuthUrlResponse, ExchangeCodeRequest};

/// Where to send the user to sign in with the identity provider.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LoginRedirect {
    pub url: Url,
}

/// Query parameters the provider hands back on the callback route.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// `auth_code` is the backend's name for the code, `code` the provider's.
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match &*key {
                "auth_code" => params.code = value.or(params.code.take()),
                "code" => params.code = params.code.take().or(value),
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }
}

impl SessionManager {
    /// Asks the backend where to send the user to sign in.
    ///
    /// # Errors
    ///
    /// [`Error::LoginInit`] wrapping the transport or validation failure.
    pub async fn login(&self) -> Result<LoginRedirect, Error> {
        let request = ApiRequest::get(&self.config().endpoints.authorize).without_refresh();
        let fetched = async {
            let response = self.execute(&request).await?;
            Transport::read_json::<AuthUrlResponse>(response).await
        };
        match fetched.await {
            Ok(body) => Ok(LoginRedirect { url: body.auth_url }),
            Err(e) => {
                tracing::warn!(error = %e, "could not obtain authorization URL");
                Err(Error::LoginInit(Box::new(e)))
            }
        }
    }

    /// Exchanges the one-time code from the callback for a session.
    ///
    /// Waits for bootstrap first. On failure any partial session is cleared
    /// and the reason is kept as `last_error`.
    ///
    /// # Errors
    ///
    /// [`Error::Callback`] wrapping [`Error::MissingAuthCode`],
    /// [`Error::AuthExchange`], [`Error::Validation`] or a transport error.
    pub async fn complete_login(&self, auth_code: &str) -> Result<User, Error> {
        self.bootstrap().await;
        let _loading = self.inner.store.loading();

        match self.exchange_code(auth_code).await {
            Ok(AuthResult { user, tokens, .. }) => {
                tracing::info!(user_id = %user.id, "signed in");
                self.inner.store.authenticate(user.clone(), tokens.access_token);
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-in callback failed");
                self.inner.store.sign_out(Some(e.to_string()));
                Err(Error::Callback(Box::new(e)))
            }
        }
    }

    /// [`complete_login`](Self::complete_login) driven by the raw callback
    /// query string.
    ///
    /// # Errors
    ///
    /// As `complete_login`; a provider `error` parameter is reported as
    /// [`Error::AuthExchange`].
    pub async fn complete_login_from_query(&self, query: &str) -> Result<User, Error> {
        let params = CallbackParams::parse(query);
        if let Some(error) = params.error {
            let desc = params.error_description.unwrap_or(error);
            tracing::warn!(description = %desc, "provider returned an error");
            let e = Error::AuthExchange(desc);
            self.bootstrap().await;
            self.inner.store.record_error(e.to_string());
            return Err(Error::Callback(Box::new(e)));
        }
        self.complete_login(params.code.as_deref().unwrap_or_default())
            .await
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<AuthResult, Error> {
        if auth_code.is_empty() {
            return Err(Error::MissingAuthCode);
        }
        let config = self.config();
        let request = match config.endpoints.code_exchange {
            CodeExchange::PostJson => ApiRequest::post(&config.endpoints.exchange_code)
                .with_json(&ExchangeCodeRequest { auth_code })?,
            CodeExchange::GetQuery => ApiRequest::get(&config.endpoints.exchange_code)
                .with_query("code", auth_code),
        }
        .without_refresh();

        let response = self.execute(&request).await.map_err(|e| match e {
            Error::Api { body, .. } => Error::AuthExchange(body.error),
            other => other,
        })?;
        Transport::read_json(response).await
    }

    /// Signs out locally and tells the backend to drop the refresh credential.
    ///
    /// The local session is cleared even when the backend call fails; that
    /// failure is only logged.
    ///
    /// # Errors
    ///
    /// Currently always `Ok`.
    pub async fn logout(&self) -> Result<(), Error> {
        let _loading = self.inner.store.loading();
        if let Err(e) = self.revoke_remote_session().await {
            tracing::warn!(error = %e, "backend logout failed, clearing local session anyway");
        }
        self.inner.transport.clear_csrf().await;
        self.inner.store.sign_out(None);
        tracing::info!("signed out");
        Ok(())
    }

    async fn revoke_remote_session(&self) -> Result<(), Error> {
        let transport = &self.inner.transport;
        let csrf = transport.csrf_token().await?;
        let request = ApiRequest::post(&self.config().endpoints.logout).internal();
        let token = self.inner.store.access_token();
        let response = transport.send(&request, token.as_ref(), Some(&csrf)).await?;
        Transport::ensure_success(response).await?;
        Ok(())
    }
}

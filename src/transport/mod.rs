//! HTTP plumbing between the session manager and the Growth backend.
//!
//! [`Transport`] owns the `reqwest` client (with a cookie store, so the
//! server-managed refresh cookie travels on every call) and the CSRF cache.
//! [`Transport::execute`] is the retry interceptor: it attaches credentials,
//! and replays a request once after a token refresh (401) or a CSRF refetch
//! (403).

mod csrf;
mod request;
mod retry;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

pub use request::ApiRequest;
pub use retry::TokenSource;

use crate::config::ClientConfig;
use crate::error::{ApiError, Error};
use crate::token::AccessToken;
use crate::wire::CsrfResponse;
use csrf::CsrfCache;

/// Anti-forgery header attached to mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

pub struct Transport {
    config: ClientConfig,
    http: reqwest::Client,
    csrf: CsrfCache,
}

impl Transport {
    /// Build a transport with its own cookie-enabled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self::with_http_client(config, http))
    }

    /// Use a custom HTTP client. It must keep cookies for refresh to work.
    #[must_use]
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            csrf: CsrfCache::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends one attempt of `request`. Only failures to get a response at all
    /// are errors here; HTTP error statuses are returned as responses.
    pub(crate) async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&AccessToken>,
        csrf: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        let url = self.config.url_for(&request.path)?;
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.secret());
        }
        if let Some(csrf) = csrf {
            builder = builder.header(CSRF_HEADER, csrf);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, path = %request.path, "backend request");
        builder.send().await.map_err(|e| {
            tracing::debug!(error = %e, path = %request.path, "backend unreachable");
            Error::from(e)
        })
    }

    /// Returns the cached CSRF token, fetching it first if absent.
    pub(crate) async fn csrf_token(&self) -> Result<String, Error> {
        self.csrf
            .get_or_fetch(|| async {
                let request = ApiRequest::get(&self.config.endpoints.csrf_token).internal();
                let response = self.send(&request, None, None).await?;
                let response = Self::ensure_success(response).await?;
                let body: CsrfResponse = Self::read_json(response).await?;
                tracing::debug!("fetched CSRF token");
                Ok(body.csrf_token)
            })
            .await
    }

    pub(crate) async fn invalidate_csrf(&self, rejected: &str) {
        self.csrf.invalidate(rejected).await;
    }

    pub(crate) async fn clear_csrf(&self) {
        self.csrf.clear().await;
    }

    /// Checks HTTP response status; returns the response on success or the
    /// backend's `{error, details?}` body as [`Error::Api`].
    pub(crate) async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let reason = status.canonical_reason().unwrap_or("Unknown status");
        let bytes = response.bytes().await.unwrap_or_default();
        let body = serde_json::from_slice::<ApiError>(&bytes)
            .unwrap_or_else(|_| ApiError::new("Request failed").with_details(reason));
        Err(Error::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Reads the body and validates it against `T`.
    pub(crate) async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, Error> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

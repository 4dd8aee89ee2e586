use reqwest::Method;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::Error;

/// One outbound call to the backend, described independently of any
/// particular attempt so it can be replayed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<JsonValue>,
    pub(crate) internal: bool,
    pub(crate) refresh_on_unauthorized: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            internal: false,
            refresh_on_unauthorized: true,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `body` cannot be serialized.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Exempt from CSRF injection and from every retry.
    ///
    /// Used for the refresh, logout, CSRF and health calls, which attach
    /// whatever they need themselves.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Surface a 401 instead of refreshing. For the sign-in endpoints, where
    /// a 401 means the code was rejected rather than the token expired.
    #[must_use]
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// POST, PUT, PATCH and DELETE.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }

    /// Whether the anti-forgery header is injected automatically.
    #[must_use]
    pub fn needs_csrf(&self) -> bool {
        self.is_mutating() && !self.internal
    }
}

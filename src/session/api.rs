use serde::Serialize;
use serde::de::DeserializeOwned;

use super::SessionManager;
use crate::error::Error;
use crate::transport::{ApiRequest, Transport};

/// Authenticated JSON calls for the rest of the application. Each goes
/// through the retry interceptor.
impl SessionManager {
    /// # Errors
    ///
    /// See [`Transport::execute`]; [`Error::Validation`] if the body does not
    /// decode as `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, Error> {
        let response = self.execute(request).await?;
        Transport::read_json(response).await
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send_json(&ApiRequest::get(path)).await
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(&ApiRequest::post(path).with_json(body)?).await
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(&ApiRequest::put(path).with_json(body)?).await
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(&ApiRequest::patch(path).with_json(body)?).await
    }

    /// # Errors
    ///
    /// See [`send_json`](Self::send_json).
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send_json(&ApiRequest::delete(path)).await
    }

    /// `true` if the backend answers its health endpoint with a success status.
    pub async fn health_check(&self) -> bool {
        let request = ApiRequest::get(&self.config().endpoints.health).internal();
        match self.inner.transport.send(&request, None, None).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "health check failed");
                false
            }
        }
    }
}

use std::future::Future;

use reqwest::StatusCode;

use super::{ApiRequest, Transport};
use crate::error::Error;
use crate::token::AccessToken;

/// Where the interceptor gets access tokens from.
///
/// Implemented by the session manager; `fresh_token` goes through the
/// refresh coordinator, so concurrent callers share one refresh.
pub trait TokenSource: Send + Sync {
    /// The token currently held, if any.
    fn current_token(&self) -> Option<AccessToken>;

    /// Obtain a newly minted token.
    fn fresh_token(&self) -> impl Future<Output = Result<AccessToken, Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    /// Hand the response to the caller (success or surfaced error).
    Return,
    Refresh,
    RefetchCsrf,
    CsrfRejected,
}

fn next_step(status: StatusCode, request: &ApiRequest, retried: bool) -> Next {
    if status.is_success() || request.internal {
        return Next::Return;
    }
    match status {
        StatusCode::UNAUTHORIZED if request.refresh_on_unauthorized && !retried => Next::Refresh,
        StatusCode::FORBIDDEN if request.is_mutating() && !retried => Next::RefetchCsrf,
        StatusCode::FORBIDDEN if request.is_mutating() => Next::CsrfRejected,
        _ => Next::Return,
    }
}

impl Transport {
    /// Sends `request` through the retry policy and returns a successful
    /// response, or the normalized error.
    ///
    /// A request is sent at most twice: the retried flag is shared between
    /// the 401 and 403 recoveries.
    ///
    /// # Errors
    ///
    /// [`Error::Network`]/[`Error::Timeout`] when no response arrived,
    /// [`Error::RefreshFailure`] when the token could not be refreshed,
    /// [`Error::CsrfRejected`] on a repeated 403, [`Error::Api`] otherwise.
    pub async fn execute<S: TokenSource>(
        &self,
        tokens: &S,
        request: &ApiRequest,
    ) -> Result<reqwest::Response, Error> {
        let mut token = tokens.current_token();
        if !request.internal && token.as_ref().is_some_and(AccessToken::is_expired) {
            tracing::debug!(path = %request.path, "access token expired, refreshing before send");
            token = Some(tokens.fresh_token().await?);
        }

        let mut retried = false;
        loop {
            let csrf = if request.needs_csrf() {
                Some(self.csrf_token().await?)
            } else {
                None
            };
            let response = self.send(request, token.as_ref(), csrf.as_deref()).await?;

            match next_step(response.status(), request, retried) {
                Next::Return => return Self::ensure_success(response).await,
                Next::Refresh => {
                    retried = true;
                    let current = tokens.current_token();
                    if current.is_some() && current != token {
                        tracing::debug!(path = %request.path, "token already rotated, replaying");
                        token = current;
                    } else {
                        tracing::debug!(path = %request.path, "401, refreshing and replaying");
                        token = Some(tokens.fresh_token().await?);
                    }
                }
                Next::RefetchCsrf => {
                    retried = true;
                    tracing::debug!(path = %request.path, "403, refetching CSRF token and replaying");
                    if let Some(rejected) = &csrf {
                        self.invalidate_csrf(rejected).await;
                    }
                }
                Next::CsrfRejected => {
                    tracing::warn!(path = %request.path, "CSRF token rejected after refetch");
                    return Err(Error::CsrfRejected);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_returned() {
        let req = ApiRequest::get("/a");
        assert_eq!(next_step(StatusCode::OK, &req, false), Next::Return);
        assert_eq!(next_step(StatusCode::NO_CONTENT, &req, true), Next::Return);
    }

    #[test]
    fn test_unauthorized_refreshes_once() {
        let req = ApiRequest::get("/a");
        assert_eq!(next_step(StatusCode::UNAUTHORIZED, &req, false), Next::Refresh);
        assert_eq!(next_step(StatusCode::UNAUTHORIZED, &req, true), Next::Return);
    }

    #[test]
    fn test_internal_requests_never_retry() {
        let req = ApiRequest::post("/api/v1/auth/refresh").internal();
        assert_eq!(next_step(StatusCode::UNAUTHORIZED, &req, false), Next::Return);
        assert_eq!(next_step(StatusCode::FORBIDDEN, &req, false), Next::Return);
    }

    #[test]
    fn test_sign_in_endpoints_surface_unauthorized() {
        let req = ApiRequest::post("/api/v1/auth/web/exchange-code").without_refresh();
        assert_eq!(next_step(StatusCode::UNAUTHORIZED, &req, false), Next::Return);
        assert_eq!(next_step(StatusCode::FORBIDDEN, &req, false), Next::RefetchCsrf);
    }

    #[test]
    fn test_forbidden_on_mutation_refetches_csrf_once() {
        let req = ApiRequest::put("/api/v1/profile");
        assert_eq!(next_step(StatusCode::FORBIDDEN, &req, false), Next::RefetchCsrf);
        assert_eq!(next_step(StatusCode::FORBIDDEN, &req, true), Next::CsrfRejected);
    }

    #[test]
    fn test_forbidden_on_read_is_surfaced() {
        let req = ApiRequest::get("/api/v1/profile");
        assert_eq!(next_step(StatusCode::FORBIDDEN, &req, false), Next::Return);
    }

    #[test]
    fn test_other_errors_are_surfaced() {
        let req = ApiRequest::post("/a");
        assert_eq!(
            next_step(StatusCode::INTERNAL_SERVER_ERROR, &req, false),
            Next::Return
        );
    }
}

//! Request and response bodies exchanged with the Growth backend.

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::token::AccessToken;
use crate::types::User;

#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct AuthUrlResponse {
    pub auth_url: Url,
}

#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct CsrfResponse {
    #[serde(deserialize_with = "non_empty")]
    pub csrf_token: String,
}

/// Token half of an auth response.
///
/// The backend also returns its refresh token here. It is not read; the
/// refresh credential only travels in the cookie.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenPair {
    pub access_token: AccessToken,
}

#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct AuthResult {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct RefreshResponse {
    pub tokens: TokenPair,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct ProfileResponse {
    pub user: User,
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Err(serde::de::Error::custom("value must not be empty"));
    }
    Ok(s)
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExchangeCodeRequest<'a> {
    pub(crate) auth_code: &'a str,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::fixtures::user_json;

    #[test]
    fn auth_result_ignores_refresh_token() {
        let raw = json!({
            "user": user_json(),
            "tokens": { "access_token": "acc", "refresh_token": "ref" }
        });
        let result: AuthResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.tokens.access_token.secret(), "acc");
        assert_eq!(result.user.email.as_str(), "ada@example.com");
    }

    #[test]
    fn auth_result_requires_access_token() {
        let raw = json!({ "user": user_json(), "tokens": { "access_token": "" } });
        assert!(serde_json::from_value::<AuthResult>(raw).is_err());

        let raw = json!({ "user": user_json(), "tokens": {} });
        assert!(serde_json::from_value::<AuthResult>(raw).is_err());
    }

    #[test]
    fn refresh_response_user_is_optional() {
        let bare: RefreshResponse =
            serde_json::from_value(json!({ "tokens": { "access_token": "a" } })).unwrap();
        assert!(bare.user.is_none());

        let full: RefreshResponse = serde_json::from_value(
            json!({ "tokens": { "access_token": "a" }, "user": user_json() }),
        )
        .unwrap();
        assert!(full.user.is_some());
    }

    #[test]
    fn auth_url_must_be_absolute() {
        assert!(serde_json::from_value::<AuthUrlResponse>(json!({ "auth_url": "/relative" })).is_err());
        let ok: AuthUrlResponse = serde_json::from_value(
            json!({ "auth_url": "https://accounts.google.com/o/oauth2/auth?x=1" }),
        )
        .unwrap();
        assert_eq!(ok.auth_url.host_str(), Some("accounts.google.com"));
    }

    #[test]
    fn csrf_token_must_be_non_empty() {
        assert!(serde_json::from_value::<CsrfResponse>(json!({ "csrf_token": "" })).is_err());
    }
}

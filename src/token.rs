use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use time::{Duration, OffsetDateTime};

use crate::error::Error;

/// Tokens whose `exp` is closer than this are treated as already expired.
pub const EXPIRY_SKEW: Duration = Duration::seconds(30);

/// Short-lived bearer credential for API calls.
///
/// Held in memory only. `Debug` never prints the secret. Deserializing
/// rejects empty strings.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Expiry from the JWT `exp` claim, read without verifying the signature.
    ///
    /// `None` for opaque tokens or tokens without a numeric `exp`.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        let claims = decode_unverified_claims(&self.0)?;
        let exp = claims.get("exp")?.as_i64()?;
        OffsetDateTime::from_unix_timestamp(exp).ok()
    }

    /// `true` only when the token carries an `exp` that is within
    /// [`EXPIRY_SKEW`] of `now` or already past.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|exp| {
            exp.checked_sub(EXPIRY_SKEW)
                .is_none_or(|deadline| deadline <= now)
        })
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

impl TryFrom<String> for AccessToken {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            Err(Error::Validation("Access token is required".into()))
        } else {
            Ok(Self(s))
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Decodes the payload segment of a `header.payload.signature` token.
fn decode_unverified_claims(token: &str) -> Option<JsonValue> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let claims: JsonValue = serde_json::from_slice(&payload).ok()?;
    claims.is_object().then_some(claims)
}

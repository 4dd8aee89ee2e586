use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::error::Error;

/// Growth account identifier (UUID).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

/// Identifier of the account at the external identity provider (Google `sub`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct ExternalId(pub String);

/// Syntactically valid e-mail address (`local@domain.tld`, no whitespace).
///
/// Guaranteed valid by construction, including when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for Email {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_valid_email(&s) {
            Ok(Self(s))
        } else {
            Err(Error::Validation(format!("invalid email: {s:?}")))
        }
    }
}

impl From<Email> for String {
    fn from(e: Email) -> Self {
        e.0
    }
}

fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // at least one character on each side of some dot
    domain
        .match_indices('.')
        .any(|(i, _)| i > 0 && i + 1 < domain.len())
}

/// Non-empty display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Longest name accepted by a profile update.
    pub const MAX_LEN: usize = 100;

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DisplayName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            Err(Error::Validation("Name is required".into()))
        } else {
            Ok(Self(s))
        }
    }
}

impl From<DisplayName> for String {
    fn from(n: DisplayName) -> Self {
        n.0
    }
}

/// Authenticated Growth user.
///
/// Field names follow the backend payload (`google_id`, `name`, `picture`);
/// every field is validated while deserializing, so holding a `User` proves
/// the payload matched the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "google_id")]
    pub external_id: ExternalId,
    pub email: Email,
    #[serde(rename = "name")]
    pub display_name: DisplayName,
    #[serde(rename = "picture", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Url>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields accepted by `PUT /api/v1/profile`.
///
/// Validated on construction: `name` must be 1..=100 characters and
/// `picture`, when set, an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<Url>,
}

impl ProfileUpdate {
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is empty or too long.
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation("Name is required".into()));
        }
        if name.chars().count() > DisplayName::MAX_LEN {
            return Err(Error::Validation("Name is too long".into()));
        }
        Ok(Self {
            name,
            picture: None,
        })
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `picture` is not an absolute URL.
    pub fn with_picture(mut self, picture: &str) -> Result<Self, Error> {
        let url = Url::parse(picture)
            .map_err(|_| Error::Validation("Please enter a valid URL".into()))?;
        self.picture = Some(url);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn picture(&self) -> Option<&Url> {
        self.picture.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    pub(crate) fn user_json() -> Value {
        json!({
            "id": "6f1c1c1e-8a8e-4c47-9d0e-0d6f4f7f6b11",
            "google_id": "google-123",
            "email": "ada@example.com",
            "name": "Ada",
            "picture": "https://cdn.example.com/ada.png",
            "created_at": "2024-01-02T03:04:05Z",
            "updated_at": "2024-01-02T03:04:05Z"
        })
    }
}

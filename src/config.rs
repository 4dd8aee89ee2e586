use std::time::Duration;

use url::Url;

use crate::error::Error;

/// How the one-time authorization code is handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeExchange {
    /// `POST <exchange_code>` with a JSON body `{"auth_code": ...}`.
    PostJson,
    /// `GET <exchange_code>?code=...`.
    GetQuery,
}

/// Backend endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Endpoints {
    pub authorize: String,
    pub exchange_code: String,
    pub code_exchange: CodeExchange,
    pub refresh: String,
    pub logout: String,
    pub profile: String,
    pub csrf_token: String,
    pub health: String,
}

impl Endpoints {
    /// The `/api/v1` web routes.
    #[must_use]
    pub fn v1() -> Self {
        Self {
            authorize: "/api/v1/auth/web/google".into(),
            exchange_code: "/api/v1/auth/web/exchange-code".into(),
            code_exchange: CodeExchange::PostJson,
            refresh: "/api/v1/auth/refresh".into(),
            logout: "/api/v1/auth/logout".into(),
            profile: "/api/v1/profile".into(),
            csrf_token: "/api/v1/csrf-token".into(),
            health: "/api/v1/health".into(),
        }
    }

    /// The older `/auth/google` routes, with a `GET` callback exchange.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            authorize: "/auth/google".into(),
            exchange_code: "/auth/google/callback".into(),
            code_exchange: CodeExchange::GetQuery,
            refresh: "/auth/refresh".into(),
            ..Self::v1()
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::v1()
    }
}

/// Growth client configuration.
///
/// The backend base URL is the only required value; everything else has a
/// default and a `with_*` override.
///
/// ```rust,ignore
/// use growth_session::ClientConfig;
///
/// let config = ClientConfig::new("https://api.growth.example".parse()?)
///     .with_timeout(std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) endpoints: Endpoints,
    pub(crate) login_path: String,
    pub(crate) landing_path: String,
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Self::DEFAULT_TIMEOUT,
            endpoints: Endpoints::v1(),
            login_path: "/auth/login".into(),
            landing_path: "/dashboard".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `GROWTH_BACKEND_URL`: backend base URL
    ///
    /// # Optional env vars
    /// - `GROWTH_HTTP_TIMEOUT_SECS`: request timeout in seconds (default 15)
    /// - `GROWTH_AUTH_ROUTES`: `v1` (default) or `legacy`
    /// - `GROWTH_LOGIN_PATH`: where the route guard sends anonymous users
    /// - `GROWTH_LANDING_PATH`: post-login target when none was preserved
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or any value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url_str = lookup("GROWTH_BACKEND_URL")
            .ok_or_else(|| Error::Config("GROWTH_BACKEND_URL is required".into()))?;
        let base_url: Url = base_url_str
            .parse()
            .map_err(|e| Error::Config(format!("GROWTH_BACKEND_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Some(secs) = lookup("GROWTH_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("GROWTH_HTTP_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(routes) = lookup("GROWTH_AUTH_ROUTES") {
            let endpoints = match routes.trim().to_lowercase().as_str() {
                "v1" => Endpoints::v1(),
                "legacy" => Endpoints::legacy(),
                other => {
                    return Err(Error::Config(format!(
                        "GROWTH_AUTH_ROUTES: expected `v1` or `legacy`, got `{other}`"
                    )));
                }
            };
            config = config.with_endpoints(endpoints);
        }
        if let Some(path) = lookup("GROWTH_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Some(path) = lookup("GROWTH_LANDING_PATH") {
            config = config.with_landing_path(path);
        }

        Ok(config)
    }

    /// Override the per-request timeout (default: 15 s).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the backend endpoint set (default: [`Endpoints::v1`]).
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override where the route guard sends anonymous users.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Override the default target after sign-in.
    #[must_use]
    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    /// Backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Backend endpoint paths.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Sign-in page path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Default post-login path.
    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    /// Absolute URL for a backend path. A path prefix on the base URL is kept.
    pub(crate) fn url_for(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
            .parse()
            .map_err(|e| Error::Config(format!("invalid endpoint `{path}`: {e}")))
    }
}

use super::store::SessionState;

/// What a protected view should do for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Bootstrap has not finished; render a placeholder, do not redirect.
    Pending,
    Allow,
    /// Send the user to sign in. `location` carries the requested path in
    /// its `redirect` query parameter.
    Redirect { location: String },
}

/// Keeps anonymous users out of protected views and remembers where they
/// were headed.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    landing_path: String,
    public_paths: Vec<String>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(login_path: impl Into<String>, landing_path: impl Into<String>) -> Self {
        let login_path = login_path.into();
        Self {
            public_paths: vec![login_path.clone()],
            login_path,
            landing_path: landing_path.into(),
        }
    }

    /// Paths under `path` are reachable without a session.
    #[must_use]
    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn evaluate(&self, state: &SessionState, requested_path: &str) -> GuardDecision {
        if self.is_public(requested_path) {
            return GuardDecision::Allow;
        }
        if !state.is_initialized() {
            return GuardDecision::Pending;
        }
        if state.is_authenticated() {
            return GuardDecision::Allow;
        }
        GuardDecision::Redirect {
            location: format!(
                "{}?redirect={}",
                self.login_path,
                urlencoding::encode(requested_path)
            ),
        }
    }

    /// Where to go after a successful sign-in, given the query string of the
    /// login page. Only local paths are honored.
    #[must_use]
    pub fn post_login_target(&self, query: Option<&str>) -> String {
        query
            .and_then(|q| {
                url::form_urlencoded::parse(q.trim_start_matches('?').as_bytes())
                    .find(|(key, _)| key == "redirect")
                    .map(|(_, value)| value.into_owned())
            })
            .filter(|path| is_local_path(path))
            .unwrap_or_else(|| self.landing_path.clone())
    }

    fn is_public(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.public_paths.iter().any(|public| {
            path == public
                || path
                    .strip_prefix(public.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

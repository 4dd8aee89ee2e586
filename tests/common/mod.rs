//! In-process fake of the Growth backend, built on axum.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use growth_session::{ClientConfig, SessionManager};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub const REFRESH_COOKIE: &str = "refresh_token";
pub const GOOD_CODE: &str = "good-code";
pub const BAD_CODE: &str = "bad-code";
pub const MALFORMED_CODE: &str = "malformed-code";

/// Knobs and call counters shared with the handlers.
#[derive(Default)]
pub struct BackendState {
    pub authorize_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub csrf_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub profile_updates: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub goals_calls: AtomicUsize,

    pub refresh_fails: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub profile_unauthorized: AtomicBool,
    /// Non-zero overrides the logout response status.
    pub logout_status: AtomicU16,
    pub reject_csrf_once: AtomicBool,
    pub reject_csrf_always: AtomicBool,

    issued_tokens: AtomicUsize,
    access_token: Mutex<Option<String>>,
    csrf_token: Mutex<Option<String>>,
    display_name: Mutex<Option<String>>,
}

impl BackendState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.access_token.lock().unwrap().clone()
    }

    /// Makes the backend forget the current access token, as if it expired.
    pub fn revoke_access_token(&self) {
        *self.access_token.lock().unwrap() = None;
    }

    fn issue_access_token(&self) -> String {
        let n = self.issued_tokens.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("access-{n}");
        *self.access_token.lock().unwrap() = Some(token.clone());
        token
    }

    fn rotate_csrf(&self) {
        *self.csrf_token.lock().unwrap() = None;
    }

    fn bearer_ok(&self, headers: &HeaderMap) -> bool {
        let expected = self.current_access_token();
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        matches!((expected, presented), (Some(e), Some(p)) if e == p)
    }

    fn csrf_ok(&self, headers: &HeaderMap) -> bool {
        let expected = self.csrf_token.lock().unwrap().clone();
        let presented = headers.get("x-csrf-token").and_then(|v| v.to_str().ok());
        matches!((expected, presented), (Some(e), Some(p)) if e == p)
    }

    /// CSRF verdict for a mutating call, honoring the rejection knobs.
    fn check_csrf(&self, headers: &HeaderMap) -> Result<(), Response> {
        if self.reject_csrf_always.load(Ordering::SeqCst)
            || self.reject_csrf_once.swap(false, Ordering::SeqCst)
        {
            self.rotate_csrf();
            return Err(error(StatusCode::FORBIDDEN, "Invalid CSRF token"));
        }
        if !self.csrf_ok(headers) {
            return Err(error(StatusCode::FORBIDDEN, "Invalid CSRF token"));
        }
        Ok(())
    }

    fn user(&self) -> Value {
        let mut user = user_json();
        if let Some(name) = self.display_name.lock().unwrap().clone() {
            user["name"] = json!(name);
        }
        user
    }
}

pub fn user_json() -> Value {
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

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

type Shared = Arc<BackendState>;

pub struct Backend {
    pub addr: SocketAddr,
    pub state: Shared,
    handle: JoinHandle<()>,
}

impl Backend {
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route("/api/v1/auth/web/google", get(authorize))
            .route("/api/v1/auth/web/exchange-code", post(exchange_code))
            .route("/api/v1/auth/refresh", post(refresh))
            .route("/api/v1/auth/logout", post(logout))
            .route("/api/v1/csrf-token", get(csrf_token))
            .route("/api/v1/profile", get(get_profile).put(put_profile))
            .route("/api/v1/goals", post(create_goal))
            .route("/api/v1/health", get(|| async { Json(json!({ "status": "ok" })) }))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(format!("http://{}", self.addr).parse().unwrap())
    }

    /// A manager whose cookie store starts empty.
    pub fn manager(&self) -> SessionManager {
        let http = client_builder().cookie_store(true).build().unwrap();
        SessionManager::with_http_client(self.config(), http)
    }

    /// A manager whose cookie store already holds a valid refresh cookie.
    pub fn manager_with_session(&self) -> SessionManager {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        let url = format!("http://{}", self.addr).parse().unwrap();
        jar.add_cookie_str(&format!("{REFRESH_COOKIE}=valid; Path=/"), &url);
        let http = client_builder().cookie_provider(jar).build().unwrap();
        SessionManager::with_http_client(self.config(), http)
    }

    /// Stops accepting connections. Managers built here do not pool
    /// connections, so every later request fails to connect.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
}

async fn authorize(State(state): State<Shared>) -> Json<Value> {
    state.authorize_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "auth_url": "https://accounts.google.com/o/oauth2/v2/auth?client_id=growth&response_type=code"
    }))
}

#[derive(Deserialize)]
struct ExchangeBody {
    auth_code: String,
}

async fn exchange_code(
    State(state): State<Shared>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<ExchangeBody>,
) -> Response {
    state.exchange_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(rejection) = state.check_csrf(&headers) {
        return rejection;
    }
    match body.auth_code.as_str() {
        GOOD_CODE => {
            let token = state.issue_access_token();
            let cookie = Cookie::build((REFRESH_COOKIE, "valid"))
                .path("/")
                .http_only(true);
            let body = json!({
                "user": state.user(),
                "tokens": { "access_token": token, "refresh_token": "not-for-the-client" }
            });
            (jar.add(cookie), Json(body)).into_response()
        }
        MALFORMED_CODE => {
            let mut user = state.user();
            user["email"] = json!("not-an-email");
            let token = state.issue_access_token();
            Json(json!({ "user": user, "tokens": { "access_token": token } })).into_response()
        }
        _ => error(StatusCode::BAD_REQUEST, "Invalid authorization code"),
    }
}

async fn refresh(State(state): State<Shared>, jar: CookieJar, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if !state.csrf_ok(&headers) {
        return error(StatusCode::FORBIDDEN, "Invalid CSRF token");
    }
    let has_cookie = jar.get(REFRESH_COOKIE).is_some_and(|c| c.value() == "valid");
    if !has_cookie || state.refresh_fails.load(Ordering::SeqCst) {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    let token = state.issue_access_token();
    Json(json!({ "tokens": { "access_token": token } })).into_response()
}

async fn logout(State(state): State<Shared>, jar: CookieJar) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    state.revoke_access_token();
    let status = state.logout_status.load(Ordering::SeqCst);
    if status != 0 {
        let status = StatusCode::from_u16(status).unwrap();
        return error(status, "Logout failed");
    }
    let jar = jar.remove(Cookie::build(REFRESH_COOKIE).path("/"));
    (jar, Json(json!({ "message": "Logged out" }))).into_response()
}

async fn csrf_token(State(state): State<Shared>) -> Json<Value> {
    let n = state.csrf_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("csrf-{n}");
    *state.csrf_token.lock().unwrap() = Some(token.clone());
    Json(json!({ "csrf_token": token }))
}

async fn get_profile(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);
    if state.profile_unauthorized.load(Ordering::SeqCst) || !state.bearer_ok(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    Json(json!({ "user": state.user() })).into_response()
}

#[derive(Deserialize)]
struct ProfileBody {
    name: String,
}

async fn put_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Response {
    state.profile_updates.fetch_add(1, Ordering::SeqCst);
    if !state.bearer_ok(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if let Err(rejection) = state.check_csrf(&headers) {
        return rejection;
    }
    *state.display_name.lock().unwrap() = Some(body.name);
    Json(json!({ "user": state.user() })).into_response()
}

async fn create_goal(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.goals_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(rejection) = state.check_csrf(&headers) {
        return rejection;
    }
    (StatusCode::CREATED, Json(json!({ "id": 1, "title": "Read more" }))).into_response()
}

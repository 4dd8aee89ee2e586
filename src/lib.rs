#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod oauth;
pub mod session;
pub mod token;
pub mod transport;
pub mod types;
pub mod wire;

// Re-exports for convenient access
pub use config::{ClientConfig, CodeExchange, Endpoints};
pub use error::{ApiError, Error};
pub use oauth::LoginRedirect;
pub use session::{
    GuardDecision, RouteGuard, SESSION_EXPIRED, SessionManager, SessionPhase, SessionState,
    Subscription,
};
pub use token::AccessToken;
pub use transport::{ApiRequest, CSRF_HEADER, TokenSource, Transport};
pub use types::{DisplayName, Email, ExternalId, ProfileUpdate, User, UserId};

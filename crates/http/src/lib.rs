//! Energy platform backend client
//!
//! Wraps every backend call so the current access token is attached and an
//! expired token is refreshed once, transparently, no matter how many calls
//! hit the expiry at the same time.

pub mod client;
pub mod types;

pub use client::config::ClientConfig;
pub use client::error::{ClientError, RefreshFailure};
pub use client::expiry::{
    DashboardAuthenticator, HttpDashboardAuthenticator, LogExpiryHandler, SESSION_EXPIRED_MESSAGE,
    SESSION_EXPIRED_TITLE, SessionExpiryHandler,
};
pub use client::{SessionClient, SessionClientBuilder};

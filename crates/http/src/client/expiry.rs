//! Collaborators invoked when a session cannot be refreshed

use super::error::ClientError;
use crate::types::DashboardTokenRequest;
use async_trait::async_trait;
use energy_session::TokenPair;
use tracing::{info, warn};

/// Title of the alert shown when a standard session expires
pub const SESSION_EXPIRED_TITLE: &str = "Session expired";

/// Content of the alert shown when a standard session expires
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Alert and navigation hooks owned by the application shell
pub trait SessionExpiryHandler: Send + Sync {
    /// Show a modal alert
    fn alert(&self, title: &str, content: &str);

    /// Hard navigation to `path`
    fn navigate(&self, path: &str);
}

/// Handler that only records expiry in the logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExpiryHandler;

impl SessionExpiryHandler for LogExpiryHandler {
    fn alert(&self, title: &str, content: &str) {
        warn!(%title, %content, "Session expiry alert");
    }

    fn navigate(&self, path: &str) {
        info!(%path, "Redirect requested after session expiry");
    }
}

/// Obtains a new token pair for a kiosk/display at one location
#[async_trait]
pub trait DashboardAuthenticator: Send + Sync {
    async fn authenticate(&self, location_uid: &str) -> Result<TokenPair, ClientError>;
}

/// Dashboard authenticator backed by the backend's dashboard token endpoint
#[derive(Clone)]
pub struct HttpDashboardAuthenticator {
    client: reqwest::Client,
    url: String,
}

impl HttpDashboardAuthenticator {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DashboardAuthenticator for HttpDashboardAuthenticator {
    async fn authenticate(&self, location_uid: &str) -> Result<TokenPair, ClientError> {
        let response = self
            .client
            .post(&self.url)
            .json(&DashboardTokenRequest { location_uid })
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }
}

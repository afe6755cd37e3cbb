//! Energy platform backend client

pub mod config;
pub mod error;
pub mod expiry;
mod refresh;

use crate::types::{RefreshRequest, RefreshResponse};
use config::ClientConfig;
use energy_session::{Namespace, SessionStore};
use error::{ClientError, RefreshFailure};
use expiry::{
    DashboardAuthenticator, HttpDashboardAuthenticator, LogExpiryHandler, SESSION_EXPIRED_MESSAGE,
    SESSION_EXPIRED_TITLE, SessionExpiryHandler,
};
use futures::FutureExt;
use refresh::{RefreshOutcome, SingleFlight};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Request, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Client that authenticates backend calls from a [`SessionStore`] and
/// recovers from expired access tokens
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    client: Client,
    config: ClientConfig,
    base_url: Url,
    token_endpoints: [Url; 2],
    store: Arc<SessionStore>,
    expiry: Arc<dyn SessionExpiryHandler>,
    dashboard: Option<Arc<dyn DashboardAuthenticator>>,
    refresh: SingleFlight,
}

impl SessionClient {
    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.inner.config.normalized_base_url()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Session store this client reads tokens from
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    /// Whether a token refresh is currently underway
    pub async fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing().await
    }

    /// Create a request builder for a backend path
    ///
    /// The bearer token is attached when the request is sent, so a retried
    /// request always carries the latest token.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner
            .client
            .request(method, self.inner.config.endpoint(path))
    }

    /// Send a request through the interceptor
    ///
    /// Responses are returned as received, whatever their status, except when
    /// a backend 401 leads to a refresh that fails; that yields
    /// [`ClientError::SessionExpired`].
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        self.send_request(request.build()?).await
    }

    /// Send an already built request through the interceptor
    pub async fn send_request(&self, request: Request) -> Result<Response, ClientError> {
        let inner = &self.inner;

        if !inner.targets_backend(request.url()) {
            return Ok(inner.client.execute(request).await?);
        }

        let retry = request.try_clone();
        let (request, sent_token) = inner.authorize(request, None);
        let response = inner.client.execute(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED || inner.is_token_endpoint(response.url())
        {
            return Ok(response);
        }

        let Some(retry) = retry else {
            warn!(url = %response.url(), "Request body cannot be replayed, returning 401 as is");
            return Ok(response);
        };

        let token = self.renewed_token(sent_token).await?;
        debug!(method = %retry.method(), url = %retry.url(), "Retrying request with renewed token");
        let (retry, _) = inner.authorize(retry, Some(token));
        Ok(inner.client.execute(retry).await?)
    }

    /// Execute a request and handle common errors
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Token to retry with after a 401 on a request sent with `sent_token`
    async fn renewed_token(&self, sent_token: Option<String>) -> Result<String, ClientError> {
        if let Some(current) = self.inner.store.access_token() {
            if sent_token.as_deref() != Some(current.as_str()) {
                debug!("Access token changed while the request was in flight");
                return Ok(current);
            }
        }

        let inner = self.inner.clone();
        let outcome = self
            .inner
            .refresh
            .run(move || refresh_cycle(inner).boxed())
            .await;
        Ok(outcome?)
    }
}

/// One refresh cycle; every effect in here happens once no matter how many
/// requests wait on the cycle
async fn refresh_cycle(inner: Arc<ClientInner>) -> RefreshOutcome {
    match inner.renew_access_token().await {
        Ok(access) => {
            info!("Access token refreshed");
            Ok(access)
        }
        Err(failure) => {
            inner.expire_session(&failure).await;
            Err(failure)
        }
    }
}

/// Scheme, host and effective port match; hosts compare case-insensitively
/// because parsing lowercases them
fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host() == b.host()
        && a.port_or_known_default() == b.port_or_known_default()
}

impl ClientInner {
    /// Whether `url` lives under the backend base URL
    fn targets_backend(&self, url: &Url) -> bool {
        let prefix = self.base_url.path().trim_end_matches('/');
        same_origin(url, &self.base_url)
            && url
                .path()
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Responses of the token endpoints are never intercepted
    fn is_token_endpoint(&self, url: &Url) -> bool {
        self.token_endpoints
            .iter()
            .any(|endpoint| same_origin(url, endpoint) && url.path() == endpoint.path())
    }

    /// Attach `token`, or the stored access token, as a bearer header
    fn authorize(&self, mut request: Request, token: Option<String>) -> (Request, Option<String>) {
        let token = token.or_else(|| self.store.access_token());

        if let Some(token) = &token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Access token is not a valid header value, sending without it"),
            }
        }

        (request, token)
    }

    /// POST the refresh token and store the new access token
    async fn renew_access_token(&self) -> Result<String, RefreshFailure> {
        let refresh = self
            .store
            .refresh_token()
            .ok_or_else(|| RefreshFailure::new("no refresh token stored"))?;

        let response = self
            .client
            .post(self.config.endpoint(&self.config.refresh_path))
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await
            .map_err(|e| RefreshFailure::new(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshFailure::new(format!(
                "refresh endpoint returned {status}"
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshFailure::new(format!("malformed refresh response: {e}")))?;

        self.store
            .refresh_access_token(&body.access, None)
            .map_err(|e| RefreshFailure::new(format!("could not store refreshed token: {e}")))?;

        Ok(body.access)
    }

    /// Terminal handling of a failed refresh
    async fn expire_session(&self, failure: &RefreshFailure) {
        let namespace = self.store.namespace();
        let location_uid = self.store.location_uid();
        warn!(%namespace, error = %failure, "Token refresh failed, clearing session");

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove stored session");
        }

        match namespace {
            Namespace::Standard => {
                self.expiry.alert(SESSION_EXPIRED_TITLE, SESSION_EXPIRED_MESSAGE);

                let expiry = self.expiry.clone();
                let path = self.config.redirect_path.clone();
                let delay = self.config.redirect_delay();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    expiry.navigate(&path);
                });
            }
            Namespace::Dashboard => self.reauthenticate_dashboard(location_uid).await,
        }
    }

    /// Obtain a fresh dashboard session for the display's location
    async fn reauthenticate_dashboard(&self, location_uid: Option<String>) {
        let Some(authenticator) = &self.dashboard else {
            warn!("No dashboard authenticator configured, dashboard stays logged out");
            return;
        };
        let Some(location_uid) = location_uid else {
            warn!("Dashboard path carries no location uid, cannot re-authenticate");
            return;
        };

        match authenticator.authenticate(&location_uid).await {
            Ok(pair) => {
                match self
                    .store
                    .set_session(&pair.access, &pair.refresh, Some(Namespace::Dashboard))
                {
                    Ok(()) => info!(%location_uid, "Dashboard re-authenticated"),
                    Err(e) => warn!(%location_uid, error = %e, "Dashboard token pair rejected"),
                }
            }
            Err(e) => warn!(%location_uid, error = %e, "Dashboard re-authentication failed"),
        }
    }
}

/// Builder for SessionClient
#[derive(Default)]
pub struct SessionClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<SessionStore>>,
    expiry: Option<Arc<dyn SessionExpiryHandler>>,
    dashboard: Option<Arc<dyn DashboardAuthenticator>>,
    http_dashboard: bool,
    timeout: Option<Duration>,
}

impl SessionClientBuilder {
    /// Set the full client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the base URL, keeping default endpoints
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.config = Some(match self.config.take() {
            Some(config) => ClientConfig {
                base_url: url,
                ..config
            },
            None => ClientConfig::new(url),
        });
        self
    }

    /// Set the session store tokens are read from and written to
    pub fn store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the alert/navigation hooks used when a standard session expires
    pub fn expiry_handler(mut self, handler: Arc<dyn SessionExpiryHandler>) -> Self {
        self.expiry = Some(handler);
        self
    }

    /// Set how dashboard sessions re-authenticate after a failed refresh
    pub fn dashboard_authenticator(mut self, authenticator: Arc<dyn DashboardAuthenticator>) -> Self {
        self.dashboard = Some(authenticator);
        self
    }

    /// Re-authenticate dashboards through the backend's dashboard token endpoint
    pub fn http_dashboard_authenticator(mut self) -> Self {
        self.http_dashboard = true;
        self
    }

    /// Set a request timeout; none by default
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient, ClientError> {
        let config = self
            .config
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        if config.normalized_base_url().is_empty() {
            return Err(ClientError::Configuration("base_url is required".into()));
        }
        let store = self
            .store
            .ok_or_else(|| ClientError::Configuration("session store is required".into()))?;

        let parse = |url: String| {
            Url::parse(&url)
                .map_err(|e| ClientError::Configuration(format!("invalid URL {url}: {e}")))
        };
        let base_url = parse(config.normalized_base_url().to_string())?;
        let token_endpoints = [
            parse(config.endpoint(&config.refresh_path))?,
            parse(config.endpoint(&config.dashboard_token_path))?,
        ];

        let mut client_builder = ClientBuilder::new();
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        client_builder = client_builder.user_agent(
            config
                .user_agent
                .clone()
                .unwrap_or_else(|| concat!("energy-client/", env!("CARGO_PKG_VERSION")).to_string()),
        );
        let client = client_builder.build()?;

        let dashboard = match self.dashboard {
            Some(authenticator) => Some(authenticator),
            None if self.http_dashboard => Some(Arc::new(HttpDashboardAuthenticator::new(
                client.clone(),
                config.endpoint(&config.dashboard_token_path),
            )) as Arc<dyn DashboardAuthenticator>),
            None => None,
        };

        Ok(SessionClient {
            inner: Arc::new(ClientInner {
                client,
                config,
                base_url,
                token_endpoints,
                store,
                expiry: self.expiry.unwrap_or_else(|| Arc::new(LogExpiryHandler)),
                dashboard,
                refresh: SingleFlight::default(),
            }),
        })
    }
}

//! CLI commands

use crate::config::CliConfig;
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use energy_http::{ClientError, SessionClient, SessionExpiryHandler};
use energy_session::{FileStorage, SessionContext, SessionStore};
use reqwest::Method;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Subcommand)]
pub enum Commands {
    /// Store a token pair issued by the backend
    Login {
        /// Access token
        #[arg(long)]
        access: String,

        /// Refresh token
        #[arg(long)]
        refresh: String,
    },

    /// Show the identity decoded from the current session
    Whoami,

    /// Send a request to the backend with the current session
    Request {
        /// HTTP method
        method: String,

        /// Backend path, e.g. /api/schools/
        path: String,

        /// JSON body
        #[arg(long)]
        data: Option<String>,
    },

    /// Clear the current session
    Logout,

    /// Print the effective configuration
    Config,
}

/// Everything a command needs
pub struct CommandContext {
    pub config: CliConfig,
    pub store: Arc<SessionStore>,
}

impl CommandContext {
    pub fn new(config: CliConfig, data_dir: &Path, path: &str) -> Self {
        let storage = FileStorage::new(config.storage_dir(data_dir));
        let store = SessionStore::new(
            Arc::new(storage),
            SessionContext::from_path(path),
            config.storage_keys.clone(),
        );

        Self {
            config,
            store: Arc::new(store),
        }
    }

    fn client(&self) -> Result<SessionClient> {
        Ok(SessionClient::builder()
            .config(self.config.client.clone())
            .store(self.store.clone())
            .expiry_handler(Arc::new(ConsoleExpiryHandler))
            .http_dashboard_authenticator()
            .build()?)
    }
}

/// Prints expiry alerts to the terminal
struct ConsoleExpiryHandler;

impl SessionExpiryHandler for ConsoleExpiryHandler {
    fn alert(&self, title: &str, content: &str) {
        eprintln!("{title}: {content}");
    }

    // Nowhere to navigate in a terminal; `request` reports the expiry itself
    fn navigate(&self, _path: &str) {}
}

impl Commands {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        match self {
            Commands::Login { access, refresh } => {
                ctx.store
                    .set_session(&access, &refresh, None)
                    .context("Failed to store session")?;
                println!(
                    "Logged in as user {} ({}) in the {} session",
                    display_or_dash(&ctx.store.user_id()),
                    ctx.store.user_role(),
                    ctx.store.namespace()
                );
                Ok(())
            }
            Commands::Whoami => {
                let snapshot = ctx.store.snapshot();
                if !snapshot.is_authenticated() {
                    bail!("Not logged in ({} session)", ctx.store.namespace());
                }

                let claims = &snapshot.claims;
                let summary = serde_json::json!({
                    "namespace": snapshot.context.namespace(),
                    "user_id": claims.user_id,
                    "role": claims.role,
                    "location_id": claims.location_id,
                    "location_uid": snapshot.context.location_uid(),
                    "registration_status": claims.registration_status,
                    "trial_end_on": claims.trial_end_on,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(())
            }
            Commands::Request { method, path, data } => {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("Invalid HTTP method: {method}"))?;
                let client = ctx.client()?;

                let mut request = client.request(method, &path);
                if let Some(data) = data {
                    let body: serde_json::Value =
                        serde_json::from_str(&data).context("Request body is not valid JSON")?;
                    request = request.json(&body);
                }

                let response = match client.send(request).await {
                    Ok(response) => response,
                    Err(ClientError::SessionExpired(failure)) => {
                        info!(reason = %failure, "Session expired");
                        bail!("Session expired, run `energy login` again")
                    }
                    Err(e) => return Err(e.into()),
                };
                let status = response.status();
                let body = response.text().await?;
                if status.is_success() {
                    println!("{body}");
                    Ok(())
                } else {
                    warn!(%status, "Backend returned an error");
                    bail!("{status}: {body}")
                }
            }
            Commands::Logout => {
                ctx.store.clear().context("Failed to clear session")?;
                println!("Logged out of the {} session", ctx.store.namespace());
                Ok(())
            }
            Commands::Config => {
                println!("{}", serde_json::to_string_pretty(&ctx.config)?);
                Ok(())
            }
        }
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

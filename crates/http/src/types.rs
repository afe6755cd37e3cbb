//! Wire types for the token endpoints

use serde::{Deserialize, Serialize};

/// Body of the token refresh call
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response of the token refresh call; extra fields are ignored
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Body of the dashboard token call
#[derive(Debug, Serialize)]
pub struct DashboardTokenRequest<'a> {
    pub location_uid: &'a str,
}

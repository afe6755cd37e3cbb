//! Session storage configuration

use crate::context::Namespace;
use serde::{Deserialize, Serialize};

/// Storage keys for each session namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    /// Key of the ordinary authenticated-user session
    #[serde(default = "StorageKeys::default_standard")]
    pub standard: String,
    /// Key of the kiosk/display session
    #[serde(default = "StorageKeys::default_dashboard")]
    pub dashboard: String,
}

impl StorageKeys {
    /// Default key for the standard session
    pub const STANDARD_KEY: &'static str = "energy_session";

    /// Default key for the dashboard session
    pub const DASHBOARD_KEY: &'static str = "energy_dashboard_session";

    fn default_standard() -> String {
        Self::STANDARD_KEY.to_string()
    }

    fn default_dashboard() -> String {
        Self::DASHBOARD_KEY.to_string()
    }

    /// Resolve the storage key of a namespace
    pub fn key_for(&self, namespace: Namespace) -> &str {
        match namespace {
            Namespace::Standard => &self.standard,
            Namespace::Dashboard => &self.dashboard,
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            standard: Self::default_standard(),
            dashboard: Self::default_dashboard(),
        }
    }
}

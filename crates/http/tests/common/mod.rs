//! Shared fixtures for interceptor tests

#![allow(dead_code)]

use energy_http::{ClientConfig, SessionClient, SessionExpiryHandler};
use energy_session::{MemoryStorage, SessionContext, SessionStorage, SessionStore, StorageKeys};
use std::sync::{Arc, Mutex};

/// Expiry handler that records what the shell was asked to do
#[derive(Default)]
pub struct RecordingExpiry {
    pub alerts: Mutex<Vec<(String, String)>>,
    pub navigations: Mutex<Vec<String>>,
}

impl RecordingExpiry {
    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

impl SessionExpiryHandler for RecordingExpiry {
    fn alert(&self, title: &str, content: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), content.to_string()));
    }

    fn navigate(&self, path: &str) {
        self.navigations.lock().unwrap().push(path.to_string());
    }
}

pub struct Fixture {
    pub storage: Arc<MemoryStorage>,
    pub store: Arc<SessionStore>,
    pub expiry: Arc<RecordingExpiry>,
    pub client: SessionClient,
}

impl Fixture {
    /// Client for `base_url` whose store is logged in with `access`/`refresh`
    /// at navigation path `path`
    pub fn new(base_url: &str, path: &str, access: &str, refresh: &str) -> Self {
        Self::with_builder(base_url, path, access, refresh, |builder| builder)
    }

    pub fn with_builder(
        base_url: &str,
        path: &str,
        access: &str,
        refresh: &str,
        customize: impl FnOnce(energy_http::SessionClientBuilder) -> energy_http::SessionClientBuilder,
    ) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(SessionStore::with_storage(
            storage.clone(),
            SessionContext::from_path(path),
        ));
        store.set_session(access, refresh, None).unwrap();

        let expiry = Arc::new(RecordingExpiry::default());
        let mut config = ClientConfig::new(base_url);
        config.redirect_delay_ms = 50;

        let builder = SessionClient::builder()
            .config(config)
            .store(store.clone())
            .expiry_handler(expiry.clone());
        let client = customize(builder).build().unwrap();

        Self {
            storage,
            store,
            expiry,
            client,
        }
    }

    /// Raw persisted entry for a storage key
    pub fn persisted(&self, key: &str) -> Option<serde_json::Value> {
        self.storage
            .get(key)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    pub fn persisted_standard(&self) -> Option<serde_json::Value> {
        self.persisted(StorageKeys::STANDARD_KEY)
    }
}

//! Process-wide authority over the current session

use crate::claims::{Claims, UserRole};
use crate::config::StorageKeys;
use crate::context::{Namespace, SessionContext};
use crate::error::{Result, SessionError};
use crate::storage::SessionStorage;
use arc_swap::ArcSwap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Access/refresh token pair as issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Persisted layout: `{"access": "...", "refresh": "..."}`
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
}

/// Immutable view of the session at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub claims: Claims,
    pub context: SessionContext,
}

impl SessionSnapshot {
    fn empty(context: SessionContext) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access.is_some() && self.refresh.is_some()
    }
}

/// Session store
///
/// Readers get lock-free snapshots; writers are serialized so that each
/// read-modify-write of the persisted pair is atomic with respect to others.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    keys: StorageKeys,
    state: ArcSwap<SessionSnapshot>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.load();
        f.debug_struct("SessionStore")
            .field("namespace", &state.context.namespace())
            .field("authenticated", &state.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store and rehydrate it from storage for `context`
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        context: SessionContext,
        keys: StorageKeys,
    ) -> Self {
        let snapshot = load_snapshot(storage.as_ref(), &keys, context);
        Self {
            storage,
            keys,
            state: ArcSwap::from_pointee(snapshot),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store with the default storage keys
    pub fn with_storage(storage: Arc<dyn SessionStorage>, context: SessionContext) -> Self {
        Self::new(storage, context, StorageKeys::default())
    }

    /// The application navigated; reload the session for the new context
    pub fn set_context(&self, context: SessionContext) {
        let _guard = self.write_guard();
        let snapshot = load_snapshot(self.storage.as_ref(), &self.keys, context);
        self.state.store(Arc::new(snapshot));
    }

    /// Store a freshly issued token pair and derive all claims from it
    ///
    /// Both tokens are required. An override namespace becomes the active one.
    pub fn set_session(
        &self,
        access: &str,
        refresh: &str,
        namespace: Option<Namespace>,
    ) -> Result<()> {
        if access.trim().is_empty() || refresh.trim().is_empty() {
            return Err(SessionError::invalid_input(
                "both access and refresh tokens are required",
            ));
        }

        let _guard = self.write_guard();
        let current = self.state.load_full();
        let namespace = namespace.unwrap_or_else(|| current.context.namespace());

        self.persist(namespace, Some(access), Some(refresh))?;

        self.state.store(Arc::new(SessionSnapshot {
            access: Some(access.to_string()),
            refresh: Some(refresh.to_string()),
            claims: Claims::decode(access),
            context: current.context.clone().with_namespace(namespace),
        }));
        info!(%namespace, "Session established");
        Ok(())
    }

    /// Replace only the access token, keeping the stored refresh token as is
    ///
    /// Only the user id is re-derived; role, location, registration status
    /// and trial end keep the values decoded when the session was set. The
    /// refresh token is the one already held by the target namespace, which
    /// must have one.
    pub fn refresh_access_token(&self, access: &str, namespace: Option<Namespace>) -> Result<()> {
        if access.trim().is_empty() {
            return Err(SessionError::invalid_input("access token is required"));
        }

        let _guard = self.write_guard();
        let current = self.state.load_full();
        let namespace = namespace.unwrap_or_else(|| current.context.namespace());
        let existing = if namespace == current.context.namespace() {
            current
        } else {
            let context = current.context.clone().with_namespace(namespace);
            Arc::new(load_snapshot(self.storage.as_ref(), &self.keys, context))
        };

        let Some(refresh) = existing.refresh.as_deref() else {
            return Err(SessionError::invalid_input(format!(
                "no {namespace} session to refresh"
            )));
        };

        self.persist(namespace, Some(access), Some(refresh))?;

        let claims = Claims {
            user_id: Claims::decode_user_id(access),
            ..existing.claims.clone()
        };
        self.state.store(Arc::new(SessionSnapshot {
            access: Some(access.to_string()),
            refresh: Some(refresh.to_string()),
            claims,
            context: existing.context.clone(),
        }));
        debug!(%namespace, "Access token refreshed");
        Ok(())
    }

    /// Drop the session for the active namespace, in memory and in storage
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_guard();
        let current = self.state.load_full();
        let namespace = current.context.namespace();

        self.state
            .store(Arc::new(SessionSnapshot::empty(current.context.clone())));
        self.storage.remove(self.keys.key_for(namespace))?;
        info!(%namespace, "Session cleared");
        Ok(())
    }

    /// Current snapshot of the whole session
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.state.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.load().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.load().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.load().refresh.clone()
    }

    pub fn user_id(&self) -> String {
        self.state.load().claims.user_id.clone()
    }

    /// Role claim, `Admin` when absent or unreadable
    pub fn user_role(&self) -> UserRole {
        self.state.load().claims.role
    }

    pub fn location_id(&self) -> String {
        self.state.load().claims.location_id.clone()
    }

    /// Location UID taken from the navigation path, not from the token
    pub fn location_uid(&self) -> Option<String> {
        self.state.load().context.location_uid().map(str::to_string)
    }

    pub fn registration_status(&self) -> String {
        self.state.load().claims.registration_status.clone()
    }

    pub fn trial_end_on(&self) -> Option<NaiveDate> {
        self.state.load().claims.trial_end_on
    }

    /// Namespace currently read and written
    pub fn namespace(&self) -> Namespace {
        self.state.load().context.namespace()
    }

    fn write_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(
        &self,
        namespace: Namespace,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<()> {
        let entry = PersistedSession {
            access: access.map(str::to_string),
            refresh: refresh.map(str::to_string),
        };
        let serialized = serde_json::to_string(&entry).map_err(crate::StorageError::from)?;
        self.storage
            .set(self.keys.key_for(namespace), &serialized)?;
        Ok(())
    }
}

/// Read the entry for the context's namespace; anything unusable is an
/// empty session
fn load_snapshot(
    storage: &dyn SessionStorage,
    keys: &StorageKeys,
    context: SessionContext,
) -> SessionSnapshot {
    let namespace = context.namespace();
    let key = keys.key_for(namespace);

    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(%namespace, "No stored session");
            return SessionSnapshot::empty(context);
        }
        Err(e) => {
            warn!(%namespace, error = %e, "Failed to read stored session");
            return SessionSnapshot::empty(context);
        }
    };

    let entry: PersistedSession = match serde_json::from_str(&raw) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(%namespace, error = %e, "Stored session is corrupt, treating as logged out");
            return SessionSnapshot::empty(context);
        }
    };

    match (entry.access, entry.refresh) {
        (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
            debug!(%namespace, "Rehydrated stored session");
            SessionSnapshot {
                claims: Claims::decode(&access),
                access: Some(access),
                refresh: Some(refresh),
                context,
            }
        }
        _ => {
            debug!(%namespace, "Stored session is incomplete");
            SessionSnapshot::empty(context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};

    fn token(payload: Value) -> String {
        encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    fn teacher_token() -> String {
        token(json!({
            "user_id": 11,
            "role": "teacher",
            "location_id": "42",
            "registration_status": "active",
            "trial_end_on": "2025-12-31",
        }))
    }

    fn store_with(storage: Arc<MemoryStorage>, path: &str) -> SessionStore {
        SessionStore::with_storage(storage, SessionContext::from_path(path))
    }

    fn stored(storage: &MemoryStorage, key: &str) -> Value {
        serde_json::from_str(&storage.get(key).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_set_session_round_trips_tokens() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");
        let access = teacher_token();

        store.set_session(&access, "refresh-1", None).unwrap();

        assert_eq!(store.access_token().as_deref(), Some(access.as_str()));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert!(store.is_authenticated());
        assert_eq!(
            stored(&storage, StorageKeys::STANDARD_KEY),
            json!({ "access": access, "refresh": "refresh-1" })
        );
    }

    #[test]
    fn test_claims_derived_from_access_token() {
        let store = store_with(Arc::new(MemoryStorage::new()), "/");
        store.set_session(&teacher_token(), "r", None).unwrap();

        assert_eq!(store.user_id(), "11");
        assert_eq!(store.user_role(), UserRole::Teacher);
        assert_eq!(store.location_id(), "42");
        assert_eq!(store.registration_status(), "active");
        assert_eq!(store.trial_end_on(), NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[test]
    fn test_malformed_access_token_reads_defaults() {
        let store = store_with(Arc::new(MemoryStorage::new()), "/");
        store.set_session("garbage", "r", None).unwrap();

        assert_eq!(store.access_token().as_deref(), Some("garbage"));
        assert_eq!(store.user_id(), "");
        assert_eq!(store.user_role(), UserRole::Admin);
        assert_eq!(store.location_id(), "");
        assert_eq!(store.registration_status(), "");
        assert_eq!(store.trial_end_on(), None);
    }

    #[test]
    fn test_set_session_requires_both_tokens() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");
        let access = teacher_token();
        store.set_session(&access, "refresh-1", None).unwrap();

        let err = store.set_session("new-access", "", None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        let err = store.set_session("", "new-refresh", None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));

        // Prior session untouched
        assert_eq!(store.access_token().as_deref(), Some(access.as_str()));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(stored(&storage, StorageKeys::STANDARD_KEY)["refresh"], "refresh-1");
    }

    #[test]
    fn test_refresh_keeps_refresh_token_and_stale_claims() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");
        store.set_session(&teacher_token(), "refresh-1", None).unwrap();

        let refreshed = token(json!({ "user_id": 12, "role": "pupil", "location_id": "7" }));
        store.refresh_access_token(&refreshed, None).unwrap();

        assert_eq!(store.access_token().as_deref(), Some(refreshed.as_str()));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(store.user_id(), "12");
        // Role and location keep the values from the full session
        assert_eq!(store.user_role(), UserRole::Teacher);
        assert_eq!(store.location_id(), "42");

        let entry = stored(&storage, StorageKeys::STANDARD_KEY);
        assert_eq!(entry["access"], refreshed);
        assert_eq!(entry["refresh"], "refresh-1");
    }

    #[test]
    fn test_refresh_requires_access_token() {
        let store = store_with(Arc::new(MemoryStorage::new()), "/");
        store.set_session("a", "r", None).unwrap();

        let err = store.refresh_access_token(" ", None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert_eq!(store.access_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_refresh_without_session_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");

        let err = store.refresh_access_token("lonely", None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert_eq!(store.access_token(), None);
        assert!(storage.get(StorageKeys::STANDARD_KEY).unwrap().is_none());
    }

    #[test]
    fn test_refresh_into_other_namespace_keeps_its_refresh_token() {
        let storage = Arc::new(MemoryStorage::new());
        let dashboard = store_with(storage.clone(), "/dashboard/loc-1");
        dashboard.set_session("dash-a", "dash-r", None).unwrap();

        let store = store_with(storage.clone(), "/");
        store.set_session(&teacher_token(), "std-r", None).unwrap();

        store
            .refresh_access_token("dash-a2", Some(Namespace::Dashboard))
            .unwrap();

        assert_eq!(
            stored(&storage, StorageKeys::DASHBOARD_KEY),
            json!({ "access": "dash-a2", "refresh": "dash-r" })
        );
        assert_eq!(stored(&storage, StorageKeys::STANDARD_KEY)["refresh"], "std-r");
        assert_eq!(store.namespace(), Namespace::Dashboard);
        assert_eq!(store.refresh_token().as_deref(), Some("dash-r"));
        // Claims come from the dashboard entry, not the standard session
        assert_eq!(store.user_role(), UserRole::Admin);
        assert_eq!(store.location_id(), "");
    }

    #[test]
    fn test_refresh_into_empty_namespace_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");
        store.set_session("std-a", "std-r", None).unwrap();

        let err = store
            .refresh_access_token("dash-a2", Some(Namespace::Dashboard))
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert!(storage.get(StorageKeys::DASHBOARD_KEY).unwrap().is_none());
        assert_eq!(store.namespace(), Namespace::Standard);
        assert_eq!(store.access_token().as_deref(), Some("std-a"));
    }

    #[test]
    fn test_rehydrates_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let access = teacher_token();
        storage
            .set(
                StorageKeys::STANDARD_KEY,
                &json!({ "access": access, "refresh": "r" }).to_string(),
            )
            .unwrap();

        let store = store_with(storage, "/schools");
        assert!(store.is_authenticated());
        assert_eq!(store.user_role(), UserRole::Teacher);
    }

    #[test]
    fn test_corrupt_or_incomplete_storage_is_logged_out() {
        for raw in ["{not json", r#"{"access": "a"}"#, r#"{"access": "", "refresh": "r"}"#, "[]"] {
            let storage = Arc::new(MemoryStorage::new());
            storage.set(StorageKeys::STANDARD_KEY, raw).unwrap();

            let store = store_with(storage, "/");
            assert!(!store.is_authenticated(), "entry {raw}");
            assert_eq!(store.access_token(), None);
            assert_eq!(store.user_role(), UserRole::Admin);
        }
    }

    #[test]
    fn test_namespaces_are_independent() {
        let storage = Arc::new(MemoryStorage::new());
        let standard = store_with(storage.clone(), "/schools/abc");
        standard.set_session("std-access", "std-refresh", None).unwrap();

        let dashboard = store_with(storage.clone(), "/dashboard/loc-1");
        assert_eq!(dashboard.namespace(), Namespace::Dashboard);
        assert!(!dashboard.is_authenticated());

        dashboard.set_session("dash-access", "dash-refresh", None).unwrap();
        assert_eq!(stored(&storage, StorageKeys::DASHBOARD_KEY)["access"], "dash-access");
        assert_eq!(stored(&storage, StorageKeys::STANDARD_KEY)["access"], "std-access");

        dashboard.clear().unwrap();
        assert!(storage.get(StorageKeys::DASHBOARD_KEY).unwrap().is_none());
        assert!(storage.get(StorageKeys::STANDARD_KEY).unwrap().is_some());
    }

    #[test]
    fn test_namespace_override_switches_active_namespace() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");

        store
            .set_session("a", "r", Some(Namespace::Dashboard))
            .unwrap();
        assert_eq!(store.namespace(), Namespace::Dashboard);
        assert!(storage.get(StorageKeys::STANDARD_KEY).unwrap().is_none());
        assert_eq!(stored(&storage, StorageKeys::DASHBOARD_KEY)["refresh"], "r");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");
        store.set_session(&teacher_token(), "r", None).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert_eq!(store.user_id(), "");
        assert_eq!(store.location_id(), "");
        assert_eq!(store.trial_end_on(), None);
        assert!(storage.get(StorageKeys::STANDARD_KEY).unwrap().is_none());
    }

    #[test]
    fn test_location_uid_comes_from_path() {
        let store = store_with(Arc::new(MemoryStorage::new()), "/dashboard/uid-77");
        store.set_session(&teacher_token(), "r", None).unwrap();

        assert_eq!(store.location_uid().as_deref(), Some("uid-77"));
        assert_eq!(store.location_id(), "42");
    }

    #[test]
    fn test_set_context_reloads_session() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone(), "/");
        store.set_session("std", "r", None).unwrap();

        store.set_context(SessionContext::from_path("/dashboard/x"));
        assert_eq!(store.namespace(), Namespace::Dashboard);
        assert!(!store.is_authenticated());

        store.set_context(SessionContext::from_path("/"));
        assert_eq!(store.access_token().as_deref(), Some("std"));
    }
}

//! Session namespaces and the navigation context that selects them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path segment that marks a kiosk/display route
const DASHBOARD_SEGMENT: &str = "dashboard";

/// Independent persisted sessions that can coexist on one client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Ordinary authenticated-user session
    #[default]
    Standard,
    /// Kiosk/display session scoped to one location
    Dashboard,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the composing application currently is
///
/// The store never looks at navigation state itself; the application builds a
/// context from its current path and hands it over, both at startup and
/// whenever it navigates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    path: String,
    namespace: Namespace,
    location_uid: Option<String>,
}

impl SessionContext {
    /// Build a context from a navigation path such as `/dashboard/ab12cd/`
    ///
    /// A first segment of `dashboard` selects the dashboard namespace. The
    /// location UID is the second path segment, when present.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let route = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let mut segments = route.split('/').filter(|s| !s.is_empty());

        let first = segments.next();
        let namespace = if first == Some(DASHBOARD_SEGMENT) {
            Namespace::Dashboard
        } else {
            Namespace::Standard
        };
        let location_uid = segments.next().map(str::to_string);

        Self {
            path,
            namespace,
            location_uid,
        }
    }

    /// Context for an explicit namespace with no navigation path
    pub fn for_namespace(namespace: Namespace) -> Self {
        Self {
            path: String::new(),
            namespace,
            location_uid: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Location UID parsed from the path, not from any token
    pub fn location_uid(&self) -> Option<&str> {
        self.location_uid.as_deref()
    }

    pub(crate) fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_path_selects_dashboard_namespace() {
        let ctx = SessionContext::from_path("/dashboard/ab12cd");
        assert_eq!(ctx.namespace(), Namespace::Dashboard);
        assert_eq!(ctx.location_uid(), Some("ab12cd"));
    }

    #[test]
    fn test_other_paths_select_standard_namespace() {
        for path in ["/", "", "/schools/xyz/energy", "/lessons/dashboard"] {
            let ctx = SessionContext::from_path(path);
            assert_eq!(ctx.namespace(), Namespace::Standard, "path {path}");
        }
    }

    #[test]
    fn test_location_uid_ignores_query_and_fragment() {
        let ctx = SessionContext::from_path("/dashboard/loc-9?screen=2#top");
        assert_eq!(ctx.location_uid(), Some("loc-9"));

        let ctx = SessionContext::from_path("/schools/loc-7/");
        assert_eq!(ctx.namespace(), Namespace::Standard);
        assert_eq!(ctx.location_uid(), Some("loc-7"));
    }

    #[test]
    fn test_missing_location_uid() {
        assert_eq!(SessionContext::from_path("/dashboard").location_uid(), None);
        assert_eq!(
            SessionContext::for_namespace(Namespace::Dashboard).location_uid(),
            None
        );
    }
}

//! Session store for the energy platform client
//!
//! Holds the current access/refresh token pair, persists it per namespace and
//! exposes the claims decoded from the access token.

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod storage;
pub mod store;

pub use claims::{Claims, UserRole};
pub use config::StorageKeys;
pub use context::{Namespace, SessionContext};
pub use error::{SessionError, StorageError};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::{SessionSnapshot, SessionStore, TokenPair};

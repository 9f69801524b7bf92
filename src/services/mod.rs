//! External collaborators module
//!
//! This module contains the pieces the core talks to but does not own: the
//! backend client, the query cache, the auth session and network reachability.

pub mod backend;
pub mod network;
pub mod query_cache;
pub mod session;

// Re-export main types
pub use backend::{BackendClient, HttpBackendClient, UserProfile};
pub use network::NetworkMonitor;
pub use query_cache::{InvalidationLog, QueryInvalidator, QueryKey};
pub use session::{Session, SessionStore};

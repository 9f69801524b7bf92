//! Rest Clock - A state-managed HTTP server for workout rest timers
//!
//! This library provides the single shared rest countdown shown between sets
//! and the background coordinator that keeps cached workout aggregates fresh
//! while a user session exists.

pub mod config;
pub mod error;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::RestClockError;
pub use state::{AppState, RestTimerState, SyncStatus};
pub use api::create_router;
pub use tasks::{RestTimer, SyncCoordinator};
pub use utils::shutdown_signal;

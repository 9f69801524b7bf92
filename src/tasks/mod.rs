//! Background tasks module
//!
//! This module contains the rest timer's tick loop and the background sync
//! loop that run alongside the HTTP server.

pub mod background_sync;
pub mod rest_timer;

// Re-export main types and functions
pub use background_sync::{background_sync_task, SyncCoordinator};
pub use rest_timer::RestTimer;

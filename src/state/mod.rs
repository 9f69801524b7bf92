//! State management module
//!
//! This module contains the rest timer and sync status structures and the
//! application state that ties them to their collaborators.

pub mod app_state;
pub mod sync_status;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use sync_status::{SyncOutcome, SyncStatus};
pub use timer_state::{RestTimerState, TimerMetadata, TimerPhase};

//! Utility functions module
//!
//! Clock injection, countdown formatting and shutdown signal handling.

pub mod clock;
pub mod format;
pub mod signals;

// Re-export main items
pub use clock::{Clock, ManualClock, SystemClock};
pub use format::format_time;
pub use signals::shutdown_signal;

//! Display helpers for countdown values

/// Format a number of seconds as `M:SS`
///
/// Minutes are not wrapped into hours, so 3600 seconds renders as `60:00`.
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

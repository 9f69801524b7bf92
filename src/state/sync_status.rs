//! Sync status structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of the most recent connectivity check
///
/// Only the latest check is kept; there is no history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub backend_connected: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Probes currently in flight
    pub pending_operations: u64,
    /// Message from the last failed probe, cleared on success
    pub last_error: Option<String>,
}

impl SyncStatus {
    /// Online but not yet checked against the backend
    pub fn new() -> Self {
        Self {
            is_online: true,
            backend_connected: false,
            last_sync_time: None,
            pending_operations: 0,
            last_error: None,
        }
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.backend_connected = true;
        self.last_sync_time = Some(at);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: String) {
        self.backend_connected = false;
        self.last_error = Some(error);
    }

    /// Going offline also drops the backend connection flag
    pub fn set_online(&mut self, online: bool) {
        self.is_online = online;
        if !online {
            self.backend_connected = false;
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// What a sync attempt reports back to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
}

impl SyncOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

//! API request and response structures

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    services::query_cache::Invalidation,
    state::{RestTimerState, SyncStatus, TimerMetadata, TimerPhase},
    utils::format_time,
};

/// Rest timer state plus the values consumers derive from it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    #[serde(flatten)]
    pub state: RestTimerState,
    pub phase: TimerPhase,
    pub progress_percentage: f64,
    pub is_warning: bool,
    pub formatted_remaining: String,
}

impl TimerView {
    pub fn new(state: RestTimerState, warning_threshold: u64) -> Self {
        Self {
            phase: state.phase(),
            progress_percentage: state.progress_percentage(),
            is_warning: state.is_warning(warning_threshold),
            formatted_remaining: format_time(state.remaining_time),
            state,
        }
    }
}

/// API response structure for timer transition endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerView,
}

impl ApiResponse {
    /// Create a response whose status is the timer's phase
    pub fn new(message: String, timer: TimerView) -> Self {
        Self {
            status: timer.phase.as_str().to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerRequest {
    pub duration: u64,
    #[serde(default)]
    pub movement_id: Option<String>,
    #[serde(default)]
    pub workout_id: Option<String>,
}

impl StartTimerRequest {
    pub fn metadata(&self) -> TimerMetadata {
        TimerMetadata {
            movement_id: self.movement_id.clone(),
            workout_id: self.workout_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTimeRequest {
    pub seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub user_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerPinRequest {
    pub pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerPinResponse {
    pub pinned: bool,
}

/// Response for session and network endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStateResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub sync: SyncStatus,
}

impl SyncStateResponse {
    pub fn new(message: impl Into<String>, sync: SyncStatus) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            sync,
        }
    }
}

/// Combined status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub timer: TimerView,
    pub sync: SyncStatus,
    pub session_active: bool,
    pub cache: BTreeMap<String, Invalidation>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

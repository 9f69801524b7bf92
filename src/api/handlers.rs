//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

use crate::{
    error::{RestClockError, Result},
    services::Session,
    state::{AppState, RestTimerState, SyncOutcome, SyncStatus},
    tasks::RestTimer,
};
use super::responses::{
    AddTimeRequest, ApiResponse, HealthResponse, SessionRequest, StartTimerRequest,
    StatusResponse, SyncStateResponse, TimerPinRequest, TimerPinResponse, TimerView,
};

/// Map a library error onto the HTTP status a client should see
fn status_for(e: &RestClockError) -> StatusCode {
    match e {
        RestClockError::InvalidDuration => StatusCode::BAD_REQUEST,
        RestClockError::NoSession => StatusCode::UNAUTHORIZED,
        RestClockError::Network(_)
        | RestClockError::Backend { .. }
        | RestClockError::ProfileNotFound(_) => StatusCode::BAD_GATEWAY,
        RestClockError::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run a timer transition and wrap the resulting state
fn timer_transition<F>(
    state: &AppState,
    action: &str,
    message: &str,
    operation: F,
) -> std::result::Result<Json<ApiResponse>, StatusCode>
where
    F: FnOnce(&RestTimer) -> Result<RestTimerState>,
{
    match state.timer_action(action, operation) {
        Ok(timer) => {
            info!("{} endpoint called", action);
            let view = TimerView::new(timer, state.timer.warning_threshold());
            Ok(Json(ApiResponse::new(message.to_string(), view)))
        }
        Err(e) => {
            error!("Failed to apply {}: {}", action, e);
            Err(status_for(&e))
        }
    }
}

/// Handle GET /timer - Return the current timer view
pub async fn timer_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<TimerView>, StatusCode> {
    match state.timer.snapshot() {
        Ok(timer) => Ok(Json(TimerView::new(timer, state.timer.warning_threshold()))),
        Err(e) => {
            error!("Failed to read timer state: {}", e);
            Err(status_for(&e))
        }
    }
}

/// Handle POST /timer/start - Start a rest period
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartTimerRequest>,
) -> std::result::Result<Json<ApiResponse>, StatusCode> {
    let metadata = request.metadata();
    timer_transition(&state, "timer-start", "Rest timer started", |timer| {
        timer.start_timer(request.duration, metadata)
    })
}

/// Handle POST /timer/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ApiResponse>, StatusCode> {
    timer_transition(&state, "timer-pause", "Rest timer paused", RestTimer::pause_timer)
}

/// Handle POST /timer/resume
pub async fn resume_timer_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ApiResponse>, StatusCode> {
    timer_transition(&state, "timer-resume", "Rest timer resumed", RestTimer::resume_timer)
}

/// Handle POST /timer/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ApiResponse>, StatusCode> {
    timer_transition(&state, "timer-reset", "Rest timer reset", RestTimer::reset_timer)
}

/// Handle POST /timer/cancel and /timer/stop
pub async fn cancel_timer_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ApiResponse>, StatusCode> {
    timer_transition(&state, "timer-cancel", "Rest timer cancelled", RestTimer::cancel_timer)
}

/// Handle POST /timer/add-time
pub async fn add_time_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddTimeRequest>,
) -> std::result::Result<Json<ApiResponse>, StatusCode> {
    let message = format!("Added {}s of rest", request.seconds);
    timer_transition(&state, "timer-add-time", &message, |timer| {
        timer.add_time(request.seconds)
    })
}

/// Handle GET /timer/events - Stream every timer transition
pub async fn timer_events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let threshold = state.timer.warning_threshold();
    let stream = WatchStream::new(state.timer.subscribe())
        .map(move |timer| {
            Event::default()
                .event("timer")
                .json_data(TimerView::new(timer, threshold))
        })
        .take_until(state.shutdown.clone().cancelled_owned());
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle GET /sync/status
pub async fn sync_status_handler(State(state): State<Arc<AppState>>) -> Json<SyncStatus> {
    Json(state.sync.status())
}

/// Handle POST /sync/trigger - Probe the backend right now
pub async fn sync_trigger_handler(State(state): State<Arc<AppState>>) -> Json<SyncOutcome> {
    let outcome = state.sync.trigger_manual_sync().await;
    state.record_action("sync-trigger");
    Json(outcome)
}

/// Handle GET /sync/events - Stream sync status changes
pub async fn sync_events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.sync.subscribe())
        .map(|status| Event::default().event("sync").json_data(status))
        .take_until(state.shutdown.clone().cancelled_owned());
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle POST /session - A user signed in
pub async fn set_session_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionRequest>,
) -> std::result::Result<Json<SyncStateResponse>, StatusCode> {
    if request.user_id.trim().is_empty() || request.access_token.trim().is_empty() {
        warn!("Rejected session with empty user id or token");
        return Err(StatusCode::BAD_REQUEST);
    }

    state.set_session(Session::new(request.user_id, request.access_token));
    Ok(Json(SyncStateResponse::new("Session set", state.sync.status())))
}

/// Handle DELETE /session - The user signed out
pub async fn clear_session_handler(State(state): State<Arc<AppState>>) -> Json<SyncStateResponse> {
    state.clear_session();
    Json(SyncStateResponse::new("Session cleared", state.sync.status()))
}

/// Handle POST /network/online
pub async fn network_online_handler(State(state): State<Arc<AppState>>) -> Json<SyncStateResponse> {
    state.set_online(true);
    Json(SyncStateResponse::new("Network online", state.sync.status()))
}

/// Handle POST /network/offline
pub async fn network_offline_handler(State(state): State<Arc<AppState>>) -> Json<SyncStateResponse> {
    state.set_online(false);
    Json(SyncStateResponse::new("Network offline", state.sync.status()))
}

/// Handle GET /profile/timer-pin - Read the stored preference
pub async fn get_timer_pin_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<TimerPinResponse>, StatusCode> {
    let result = match state.sessions.current() {
        Some(session) => state.backend.fetch_profile(&session).await,
        None => Err(RestClockError::NoSession),
    };

    match result {
        Ok(profile) => Ok(Json(TimerPinResponse {
            pinned: profile.timer_pinned,
        })),
        Err(e) => {
            warn!("Failed to read timer pin preference: {}", e);
            Err(status_for(&e))
        }
    }
}

/// Handle PUT /profile/timer-pin - Store the preference
pub async fn put_timer_pin_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TimerPinRequest>,
) -> std::result::Result<Json<TimerPinResponse>, StatusCode> {
    let result = match state.sessions.current() {
        Some(session) => state.backend.update_timer_pinned(&session, request.pinned).await,
        None => Err(RestClockError::NoSession),
    };

    match result {
        Ok(profile) => {
            state.record_action("timer-pin");
            Ok(Json(TimerPinResponse {
                pinned: profile.timer_pinned,
            }))
        }
        Err(e) => {
            warn!("Failed to update timer pin preference: {}", e);
            Err(status_for(&e))
        }
    }
}

/// Handle GET /status - Return timer, sync and server status together
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<StatusResponse>, StatusCode> {
    let timer = match state.timer.snapshot() {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to get timer state: {}", e);
            return Err(status_for(&e));
        }
    };

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer: TimerView::new(timer, state.timer.warning_threshold()),
        sync: state.sync.status(),
        session_active: state.sessions.current().is_some(),
        cache: state.cache.snapshot(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

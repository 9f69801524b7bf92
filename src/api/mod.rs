//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timer", get(timer_handler))
        .route("/timer/start", post(start_timer_handler))
        .route("/timer/pause", post(pause_timer_handler))
        .route("/timer/resume", post(resume_timer_handler))
        .route("/timer/reset", post(reset_timer_handler))
        .route("/timer/cancel", post(cancel_timer_handler))
        .route("/timer/stop", post(cancel_timer_handler))
        .route("/timer/add-time", post(add_time_handler))
        .route("/timer/events", get(timer_events_handler))
        .route("/sync/status", get(sync_status_handler))
        .route("/sync/trigger", post(sync_trigger_handler))
        .route("/sync/events", get(sync_events_handler))
        .route("/session", post(set_session_handler).delete(clear_session_handler))
        .route("/network/online", post(network_online_handler))
        .route("/network/offline", post(network_offline_handler))
        .route(
            "/profile/timer-pin",
            get(get_timer_pin_handler).put(put_timer_pin_handler),
        )
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{RestClockError, Result},
        services::{BackendClient, Session, UserProfile},
        utils::SystemClock,
    };
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use futures::{Stream, StreamExt};
    use serde_json::{json, Value};
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };
    use tokio::time::timeout;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubBackend {
        pinned: AtomicBool,
        offline: AtomicBool,
    }

    #[async_trait]
    impl BackendClient for StubBackend {
        async fn fetch_profile(&self, session: &Session) -> Result<UserProfile> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(RestClockError::Network("dns error".to_string()));
            }
            Ok(UserProfile {
                id: session.user_id.clone(),
                timer_pinned: self.pinned.load(Ordering::SeqCst),
            })
        }

        async fn update_timer_pinned(&self, session: &Session, pinned: bool) -> Result<UserProfile> {
            self.pinned.store(pinned, Ordering::SeqCst);
            self.fetch_profile(session).await
        }
    }

    fn app_with(backend: Arc<StubBackend>) -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::new(
            0,
            "127.0.0.1".to_string(),
            10,
            Duration::from_secs(30),
            backend,
            Arc::new(SystemClock),
        ));
        let router = create_router(Arc::clone(&state));
        (state, router)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Open an SSE route and return its body as a byte stream
    async fn open_events(
        router: &Router,
        uri: &str,
    ) -> impl Stream<Item = std::result::Result<axum::body::Bytes, axum::Error>> + Unpin {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        response.into_body().into_data_stream()
    }

    /// Read the next `(event, data)` pair, skipping keep-alive comments
    async fn next_event<S>(stream: &mut S, buffer: &mut String) -> Option<(String, Value)>
    where
        S: Stream<Item = std::result::Result<axum::body::Bytes, axum::Error>> + Unpin,
    {
        loop {
            while let Some(end) = buffer.find("\n\n") {
                let block: String = buffer.drain(..end + 2).collect();
                let mut name = String::new();
                let mut data = None;
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        name = value.trim().to_string();
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data = serde_json::from_str(value.trim()).ok();
                    }
                }
                if let Some(data) = data {
                    return Some((name, data));
                }
            }

            let chunk = stream.next().await?.unwrap();
            buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    /// Drain the stream and report whether it ended
    async fn stream_ends<S>(stream: &mut S) -> bool
    where
        S: Stream<Item = std::result::Result<axum::body::Bytes, axum::Error>> + Unpin,
    {
        timeout(Duration::from_secs(5), async { while stream.next().await.is_some() {} })
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn timer_events_push_transitions_until_shutdown() {
        let (state, router) = app_with(Arc::default());
        let mut events = open_events(&router, "/timer/events").await;
        let mut buffer = String::new();

        let (name, data) = timeout(Duration::from_secs(5), next_event(&mut events, &mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "timer");
        assert_eq!(data["phase"], "idle");

        call(&router, "POST", "/timer/start", Some(json!({ "duration": 30 }))).await;
        let (name, data) = timeout(Duration::from_secs(5), next_event(&mut events, &mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "timer");
        assert_eq!(data["phase"], "running");
        assert_eq!(data["duration"], 30);

        state.shutdown.cancel();
        assert!(stream_ends(&mut events).await, "timer events should end on shutdown");
    }

    #[tokio::test]
    async fn sync_events_push_status_until_shutdown() {
        let (state, router) = app_with(Arc::default());
        let mut events = open_events(&router, "/sync/events").await;
        let mut buffer = String::new();

        let (name, data) = timeout(Duration::from_secs(5), next_event(&mut events, &mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "sync");
        assert_eq!(data["isOnline"], true);

        call(&router, "POST", "/network/offline", None).await;
        let (name, data) = timeout(Duration::from_secs(5), next_event(&mut events, &mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "sync");
        assert_eq!(data["isOnline"], false);

        state.shutdown.cancel();
        assert!(stream_ends(&mut events).await, "sync events should end on shutdown");
    }

    #[tokio::test]
    async fn start_pause_cancel_round_trip() {
        let (_, router) = app_with(Arc::default());

        let (status, body) = call(
            &router,
            "POST",
            "/timer/start",
            Some(json!({ "duration": 90, "movementId": "bench-press" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["timer"]["remainingTime"], 90);
        assert_eq!(body["timer"]["movementId"], "bench-press");
        assert_eq!(body["timer"]["formattedRemaining"], "1:30");

        let (_, body) = call(&router, "POST", "/timer/pause", None).await;
        assert_eq!(body["status"], "paused");
        assert_eq!(body["timer"]["isPaused"], true);

        let (_, body) = call(&router, "POST", "/timer/stop", None).await;
        assert_eq!(body["status"], "idle");
        assert_eq!(body["timer"]["isActive"], false);

        let (_, body) = call(&router, "GET", "/status", None).await;
        assert_eq!(body["lastAction"], "timer-cancel");
    }

    #[tokio::test]
    async fn zero_duration_is_bad_request() {
        let (state, router) = app_with(Arc::default());
        let (status, _) = call(&router, "POST", "/timer/start", Some(json!({ "duration": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.timer.snapshot().unwrap().is_active);
    }

    #[tokio::test]
    async fn add_time_when_idle_leaves_timer_idle() {
        let (_, router) = app_with(Arc::default());
        let (status, body) = call(&router, "POST", "/timer/add-time", Some(json!({ "seconds": 30 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "idle");
        assert_eq!(body["timer"]["duration"], 0);
    }

    #[tokio::test]
    async fn manual_sync_reports_failure_without_server_error() {
        let backend = Arc::new(StubBackend::default());
        backend.offline.store(true, Ordering::SeqCst);
        let (_, router) = app_with(backend);

        call(
            &router,
            "POST",
            "/session",
            Some(json!({ "userId": "user-1", "accessToken": "token" })),
        )
        .await;

        let (status, body) = call(&router, "POST", "/sync/trigger", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);

        let (_, body) = call(&router, "GET", "/sync/status", None).await;
        assert_eq!(body["backendConnected"], false);
        assert_eq!(body["pendingOperations"], 0);
    }

    #[tokio::test]
    async fn manual_sync_success_bumps_cache_generations() {
        let (_, router) = app_with(Arc::default());
        call(
            &router,
            "POST",
            "/session",
            Some(json!({ "userId": "user-1", "accessToken": "token" })),
        )
        .await;

        let (_, body) = call(&router, "POST", "/sync/trigger", None).await;
        assert_eq!(body["success"], true);

        let (_, body) = call(&router, "GET", "/status", None).await;
        assert_eq!(body["sessionActive"], true);
        assert_eq!(body["sync"]["backendConnected"], true);
        assert_eq!(body["cache"]["personal-records"]["generation"], 1);
    }

    #[tokio::test]
    async fn empty_session_is_rejected() {
        let (state, router) = app_with(Arc::default());
        let (status, _) = call(
            &router,
            "POST",
            "/session",
            Some(json!({ "userId": " ", "accessToken": "token" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.sessions.current().is_none());
    }

    #[tokio::test]
    async fn offline_event_updates_sync_status() {
        let (_, router) = app_with(Arc::default());
        let (_, body) = call(&router, "POST", "/network/offline", None).await;
        assert_eq!(body["sync"]["isOnline"], false);

        let (_, body) = call(&router, "POST", "/network/online", None).await;
        assert_eq!(body["sync"]["isOnline"], true);
    }

    #[tokio::test]
    async fn timer_pin_requires_session() {
        let backend = Arc::new(StubBackend::default());
        let (_, router) = app_with(backend.clone());

        let (status, _) = call(&router, "GET", "/profile/timer-pin", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        call(
            &router,
            "POST",
            "/session",
            Some(json!({ "userId": "user-1", "accessToken": "token" })),
        )
        .await;
        let (status, body) = call(&router, "PUT", "/profile/timer-pin", Some(json!({ "pinned": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pinned"], true);

        let (_, body) = call(&router, "GET", "/profile/timer-pin", None).await;
        assert_eq!(body["pinned"], true);

        backend.offline.store(true, Ordering::SeqCst);
        let (status, _) = call(&router, "GET", "/profile/timer-pin", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_, router) = app_with(Arc::default());
        let (status, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}

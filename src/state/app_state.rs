//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    error::Result,
    services::{BackendClient, InvalidationLog, NetworkMonitor, Session, SessionStore},
    tasks::{background_sync_task, RestTimer, SyncCoordinator},
    utils::Clock,
};
use super::RestTimerState;

/// Main application state that owns the rest timer and the sync coordinator
pub struct AppState {
    /// The single rest timer for this process
    pub timer: RestTimer,
    pub sync: Arc<SyncCoordinator>,
    pub sessions: SessionStore,
    pub network: NetworkMonitor,
    pub backend: Arc<dyn BackendClient>,
    pub cache: Arc<InvalidationLog>,
    pub sync_interval: Duration,
    /// Fired on shutdown to end background loops and open event streams
    pub shutdown: CancellationToken,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    /// Create a new AppState with an idle timer and no session
    pub fn new(
        port: u16,
        host: String,
        warning_threshold: u64,
        sync_interval: Duration,
        backend: Arc<dyn BackendClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionStore::new();
        let cache = Arc::new(InvalidationLog::new(Arc::clone(&clock)));
        let sync = Arc::new(SyncCoordinator::new(
            Arc::clone(&backend),
            cache.clone(),
            sessions.subscribe(),
            Arc::clone(&clock),
        ));

        Self {
            timer: RestTimer::new(clock, warning_threshold),
            sync,
            sessions,
            network: NetworkMonitor::new(),
            backend,
            cache,
            sync_interval,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
        }
    }

    /// Run a timer operation and record it as the last action
    pub fn timer_action<F>(&self, action: &str, operation: F) -> Result<RestTimerState>
    where
        F: FnOnce(&RestTimer) -> Result<RestTimerState>,
    {
        let state = operation(&self.timer)?;
        self.record_action(action);
        Ok(state)
    }

    pub fn set_session(&self, session: Session) {
        self.sessions.set(session);
        self.record_action("session-set");
    }

    pub fn clear_session(&self) {
        self.sessions.clear();
        self.record_action("session-cleared");
    }

    /// Forward a platform online/offline event
    pub fn set_online(&self, online: bool) {
        self.network.set_online(online);
        self.sync.set_online(online);
        self.record_action(if online { "network-online" } else { "network-offline" });
    }

    /// Start the background sync loop; it stops on shutdown
    pub fn spawn_background_sync(&self) -> JoinHandle<()> {
        info!("Spawning background sync every {:?}", self.sync_interval);
        tokio::spawn(background_sync_task(
            Arc::clone(&self.sync),
            self.sessions.subscribe(),
            self.network.subscribe(),
            self.sync_interval,
            self.shutdown.child_token(),
        ))
    }

    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

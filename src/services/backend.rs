//! Backend client used for connectivity probes and profile preferences
//!
//! The backend is a PostgREST endpoint (Supabase). A profile read is the
//! cheapest authenticated request available, so it doubles as the probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{RestClockError, Result};
use super::session::Session;

/// Profile record as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub timer_pinned: bool,
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Read the signed-in user's profile
    async fn fetch_profile(&self, session: &Session) -> Result<UserProfile>;

    /// Persist whether the rest timer stays pinned on screen
    async fn update_timer_pinned(&self, session: &Session, pinned: bool) -> Result<UserProfile>;
}

/// PostgREST client for the `profiles` table
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpBackendClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestClockError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn profile_url(&self) -> String {
        format!("{}/rest/v1/profiles", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .query(&[
                ("id", format!("eq.{}", session.user_id)),
                ("select", "id,timer_pinned".to_string()),
            ])
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RestClockError::Network("request timed out".to_string())
            } else {
                RestClockError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RestClockError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn single_profile(response: Response, user_id: &str) -> Result<UserProfile> {
        let mut rows: Vec<UserProfile> = response
            .json()
            .await
            .map_err(|e| RestClockError::Network(format!("Invalid profile payload: {}", e)))?;

        if rows.is_empty() {
            return Err(RestClockError::ProfileNotFound(user_id.to_string()));
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn fetch_profile(&self, session: &Session) -> Result<UserProfile> {
        debug!("Fetching profile for {}", session.user_id);
        let request = self.authorized(self.client.get(self.profile_url()), session);
        let response = self.send(request).await?;
        Self::single_profile(response, &session.user_id).await
    }

    async fn update_timer_pinned(&self, session: &Session, pinned: bool) -> Result<UserProfile> {
        debug!("Updating timer pin for {} to {}", session.user_id, pinned);
        let request = self
            .authorized(self.client.patch(self.profile_url()), session)
            .header("Prefer", "return=representation")
            .json(&json!({ "timer_pinned": pinned }));
        let response = self.send(request).await?;
        Self::single_profile(response, &session.user_id).await
    }
}

//! Playback session telemetry: start, heartbeat, end.
//!
//! The viewer record is authoritative for `isPaidViewer` at session start;
//! heartbeats are atomic adds so concurrent players never lose seconds.

use std::sync::Arc;

use doc_store::Mutation;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::{SessionRepo, ViewerRepo};
use crate::error::{AppError, Result};
use crate::models::{PlaybackSession, PlaybackType};
use crate::security::viewer_token::ViewerClaims;
use crate::util::{new_id, Clock};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionInput {
    pub playback_type: PlaybackType,
    #[serde(default)]
    pub device: Option<Value>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub network: Option<Value>,
}

pub struct SessionService {
    sessions: Arc<SessionRepo>,
    viewers: Arc<ViewerRepo>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(
        sessions: Arc<SessionRepo>,
        viewers: Arc<ViewerRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            viewers,
            clock,
        }
    }

    pub async fn start(
        &self,
        event_id: &str,
        claims: &ViewerClaims,
        input: StartSessionInput,
    ) -> Result<PlaybackSession> {
        if claims.event_id != event_id {
            return Err(AppError::Forbidden("Credential does not match event".into()));
        }
        let viewer = self
            .viewers
            .get(event_id, &claims.client_viewer_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Viewer is not registered".into()))?;

        let now_iso = self.clock.now_iso();
        let session = PlaybackSession {
            session_id: new_id(),
            event_id: event_id.to_string(),
            client_viewer_id: claims.client_viewer_id.clone(),
            start_time: now_iso.clone(),
            end_time: None,
            duration: 0.0,
            playback_type: input.playback_type,
            device_info: input.device,
            location: input.location,
            network: input.network,
            is_paid_viewer: viewer.is_paid_viewer,
        };
        self.sessions.create(&session).await?;

        let mut mutations = vec![
            Mutation::Add("totalSessions", 1.0),
            Mutation::Set("lastJoinAt", json!(now_iso)),
            Mutation::Set("updatedAt", json!(now_iso)),
        ];
        if viewer.first_join_at.is_none() {
            mutations.push(Mutation::Set("firstJoinAt", json!(now_iso)));
        }
        self.viewers
            .update(event_id, &claims.client_viewer_id, mutations)
            .await?;

        Ok(session)
    }

    /// Returns the accumulated duration after the add.
    pub async fn heartbeat(&self, session_id: &str, seconds: f64) -> Result<f64> {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.sessions.add_watch_seconds(session_id, seconds).await
    }

    pub async fn end(&self, session_id: &str, reported_duration: f64) -> Result<PlaybackSession> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".into()))?;

        let reported = if reported_duration.is_finite() {
            reported_duration.max(0.0)
        } else {
            0.0
        };
        let final_duration = session.duration.max(reported);
        let now_iso = self.clock.now_iso();
        let closed = self
            .sessions
            .close(session_id, &now_iso, final_duration)
            .await?;

        self.viewers
            .update(
                &session.event_id,
                &session.client_viewer_id,
                vec![
                    Mutation::Add("totalWatchTime", final_duration),
                    Mutation::Set("updatedAt", json!(now_iso)),
                ],
            )
            .await?;

        Ok(closed)
    }
}

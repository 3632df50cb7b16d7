//! Playback session repository.

use std::sync::Arc;

use doc_store::{
    Document, DocumentStore, Key, Mutation, PutCondition, StoreError, UpdateCondition,
};
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::models::PlaybackSession;

pub struct SessionRepo {
    store: Arc<dyn DocumentStore>,
    table: String,
}

fn decode(doc: Document) -> Result<PlaybackSession> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::Storage(format!("corrupt session document: {e}")))
}

impl SessionRepo {
    pub fn new(store: Arc<dyn DocumentStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub async fn create(&self, session: &PlaybackSession) -> Result<()> {
        let doc = match serde_json::to_value(session)? {
            Value::Object(map) => map,
            _ => return Err(AppError::Internal("session did not serialize to object".into())),
        };
        self.store
            .put(&self.table, doc, PutCondition::NotExists)
            .await
            .map_err(Into::into)
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<PlaybackSession>> {
        let doc = self
            .store
            .get(&self.table, &Key::partition(session_id))
            .await?;
        doc.map(decode).transpose()
    }

    /// Atomic heartbeat add. Seconds are clamped non-negative by the caller.
    pub async fn add_watch_seconds(&self, session_id: &str, seconds: f64) -> Result<f64> {
        let doc = self
            .store
            .update(
                &self.table,
                &Key::partition(session_id),
                vec![Mutation::Add("duration", seconds)],
                UpdateCondition::Exists,
            )
            .await
            .map_err(|e| match e {
                StoreError::ConditionFailed => {
                    AppError::NotFound("Session not found".to_string())
                }
                other => other.into(),
            })?;
        Ok(doc
            .get("duration")
            .and_then(Value::as_f64)
            .unwrap_or_default())
    }

    pub async fn close(
        &self,
        session_id: &str,
        end_time_iso: &str,
        duration: f64,
    ) -> Result<PlaybackSession> {
        let doc = self
            .store
            .update(
                &self.table,
                &Key::partition(session_id),
                vec![
                    Mutation::Set("endTime", json!(end_time_iso)),
                    Mutation::Set("duration", json!(duration)),
                ],
                UpdateCondition::Exists,
            )
            .await
            .map_err(|e| match e {
                StoreError::ConditionFailed => {
                    AppError::NotFound("Session not found".to_string())
                }
                other => other.into(),
            })?;
        decode(doc)
    }
}

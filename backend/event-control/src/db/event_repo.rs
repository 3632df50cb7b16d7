//! Event repository.

use std::sync::Arc;

use doc_store::{
    Document, DocumentStore, Filter, Key, Mutation, Page, PutCondition, QueryOptions, StoreError,
    UpdateCondition,
};
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::models::{migrate_event_document, Event, EventType};

pub struct EventRepo {
    store: Arc<dyn DocumentStore>,
    table: String,
}

fn decode(mut doc: Document) -> Result<Event> {
    migrate_event_document(&mut doc);
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::Storage(format!("corrupt event document: {e}")))
}

impl EventRepo {
    pub fn new(store: Arc<dyn DocumentStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Conditional put on `eventId`; an id collision is a Conflict.
    pub async fn create(&self, event: &Event) -> Result<()> {
        let doc = to_document(event)?;
        self.store
            .put(&self.table, doc, PutCondition::NotExists)
            .await
            .map_err(|e| match e {
                StoreError::ConditionFailed => {
                    AppError::Conflict("Event already exists".to_string())
                }
                other => other.into(),
            })
    }

    pub async fn get(&self, event_id: &str) -> Result<Option<Event>> {
        let doc = self
            .store
            .get(&self.table, &Key::partition(event_id))
            .await?;
        doc.map(decode).transpose()
    }

    /// Loads an event or fails with NotFound.
    pub async fn require(&self, event_id: &str) -> Result<Event> {
        self.get(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }

    pub async fn save(&self, event: &Event) -> Result<()> {
        let doc = to_document(event)?;
        self.store
            .put(&self.table, doc, PutCondition::None)
            .await
            .map_err(Into::into)
    }

    pub async fn update(&self, event_id: &str, mutations: Vec<Mutation>) -> Result<Event> {
        let doc = self
            .store
            .update(
                &self.table,
                &Key::partition(event_id),
                mutations,
                UpdateCondition::Exists,
            )
            .await
            .map_err(|e| match e {
                StoreError::ConditionFailed => AppError::NotFound("Event not found".to_string()),
                other => other.into(),
            })?;
        decode(doc)
    }

    /// Single-writer deletion guard: flips `isDeletionInProgress` only if no
    /// deletion is currently running. Concurrent callers see Conflict.
    pub async fn mark_deletion(&self, event_id: &str, now_iso: &str) -> Result<Event> {
        let doc = self
            .store
            .update(
                &self.table,
                &Key::partition(event_id),
                vec![
                    Mutation::Set("isDeletionInProgress", json!(true)),
                    Mutation::Set("deletionStartedAt", json!(now_iso)),
                    Mutation::Remove("deletionError"),
                    Mutation::Remove("deletionFailedAt"),
                ],
                UpdateCondition::AttrAbsentOrEquals("isDeletionInProgress", json!(false)),
            )
            .await
            .map_err(|e| match e {
                StoreError::ConditionFailed => {
                    AppError::Conflict("Event deletion already in progress".to_string())
                }
                other => other.into(),
            })?;
        decode(doc)
    }

    /// Records a teardown failure and releases the deletion guard so a later
    /// delete request can resume.
    pub async fn record_deletion_failure(
        &self,
        event_id: &str,
        error: &str,
        now_iso: &str,
    ) -> Result<()> {
        self.store
            .update(
                &self.table,
                &Key::partition(event_id),
                vec![
                    Mutation::Set("isDeletionInProgress", json!(false)),
                    Mutation::Set("deletionError", json!(error)),
                    Mutation::Set("deletionFailedAt", json!(now_iso)),
                ],
                UpdateCondition::Exists,
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, event_id: &str) -> Result<()> {
        self.store
            .delete(&self.table, &Key::partition(event_id))
            .await
            .map_err(Into::into)
    }

    pub async fn list(
        &self,
        search: Option<&str>,
        event_type: Option<EventType>,
        limit: Option<usize>,
        cursor: Option<String>,
    ) -> Result<(Vec<Event>, Option<String>)> {
        let mut filter = Filter::default();
        if let Some(q) = search {
            if !q.trim().is_empty() {
                filter = filter.contains("title", q.trim());
            }
        }
        if let Some(event_type) = event_type {
            filter = filter.eq("eventType", serde_json::to_value(event_type)?);
        }
        let page: Page = self
            .store
            .scan(
                &self.table,
                QueryOptions {
                    filter: (!filter.is_empty()).then_some(filter),
                    limit,
                    cursor,
                    descending: false,
                },
            )
            .await?;
        let events = page
            .items
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>>>()?;
        Ok((events, page.next_cursor))
    }
}

fn to_document(event: &Event) -> Result<Document> {
    match serde_json::to_value(event)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal("event did not serialize to object".into())),
    }
}

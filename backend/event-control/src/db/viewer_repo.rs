//! Viewer repository. Composite key (`eventId`, `clientViewerId`).

use std::sync::Arc;

use doc_store::{
    Document, DocumentStore, Filter, Key, KeyCondition, Mutation, PutCondition, QueryOptions,
    UpdateCondition,
};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{migrate_viewer_document, Viewer};

pub struct ViewerRepo {
    store: Arc<dyn DocumentStore>,
    table: String,
}

fn decode(mut doc: Document) -> Result<Viewer> {
    migrate_viewer_document(&mut doc);
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::Storage(format!("corrupt viewer document: {e}")))
}

impl ViewerRepo {
    pub fn new(store: Arc<dyn DocumentStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub async fn get(&self, event_id: &str, client_viewer_id: &str) -> Result<Option<Viewer>> {
        let doc = self
            .store
            .get(&self.table, &Key::composite(event_id, client_viewer_id))
            .await?;
        doc.map(decode).transpose()
    }

    pub async fn save(&self, viewer: &Viewer) -> Result<()> {
        let doc = match serde_json::to_value(viewer)? {
            Value::Object(map) => map,
            _ => return Err(AppError::Internal("viewer did not serialize to object".into())),
        };
        self.store
            .put(&self.table, doc, PutCondition::None)
            .await
            .map_err(Into::into)
    }

    pub async fn update(
        &self,
        event_id: &str,
        client_viewer_id: &str,
        mutations: Vec<Mutation>,
    ) -> Result<Viewer> {
        let doc = self
            .store
            .update(
                &self.table,
                &Key::composite(event_id, client_viewer_id),
                mutations,
                UpdateCondition::Exists,
            )
            .await
            .map_err(|e| match e {
                doc_store::StoreError::ConditionFailed => {
                    AppError::NotFound("Viewer not found".to_string())
                }
                other => other.into(),
            })?;
        decode(doc)
    }

    /// Finds any viewer of the event whose attribute equals the value.
    /// Used by identity reuse (match by identity key or normalized email).
    pub async fn find_by_attr(
        &self,
        event_id: &str,
        attr: &'static str,
        value: &str,
    ) -> Result<Vec<Viewer>> {
        let page = self
            .store
            .query(
                &self.table,
                None,
                KeyCondition::partition(event_id),
                QueryOptions {
                    filter: Some(Filter::default().eq(attr, Value::String(value.to_string()))),
                    ..Default::default()
                },
            )
            .await?;
        page.items.into_iter().map(decode).collect()
    }
}

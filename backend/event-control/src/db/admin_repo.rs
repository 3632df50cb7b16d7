//! Admin account repository.

use std::sync::Arc;

use doc_store::{
    Document, DocumentStore, Key, KeyCondition, Mutation, PutCondition, QueryOptions,
    UpdateCondition,
};
use serde_json::Value;

use super::tables::ADMINS_BY_EMAIL;
use crate::error::{AppError, Result};
use crate::models::Admin;

pub struct AdminRepo {
    store: Arc<dyn DocumentStore>,
    table: String,
}

fn decode(doc: Document) -> Result<Admin> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::Storage(format!("corrupt admin document: {e}")))
}

impl AdminRepo {
    pub fn new(store: Arc<dyn DocumentStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub async fn create(&self, admin: &Admin) -> Result<()> {
        let doc = match serde_json::to_value(admin)? {
            Value::Object(map) => map,
            _ => return Err(AppError::Internal("admin did not serialize to object".into())),
        };
        self.store
            .put(&self.table, doc, PutCondition::NotExists)
            .await
            .map_err(Into::into)
    }

    pub async fn get(&self, admin_id: &str) -> Result<Option<Admin>> {
        let doc = self
            .store
            .get(&self.table, &Key::partition(admin_id))
            .await?;
        doc.map(decode).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Admin>> {
        let page = self
            .store
            .query(
                &self.table,
                Some(ADMINS_BY_EMAIL),
                KeyCondition::partition(email),
                QueryOptions {
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await?;
        page.items.into_iter().next().map(decode).transpose()
    }

    pub async fn set_refresh_token_hash(
        &self,
        admin_id: &str,
        hash: Option<&str>,
        now_iso: &str,
    ) -> Result<()> {
        let mutation = match hash {
            Some(hash) => Mutation::Set("refreshTokenHash", Value::String(hash.to_string())),
            None => Mutation::Remove("refreshTokenHash"),
        };
        self.store
            .update(
                &self.table,
                &Key::partition(admin_id),
                vec![
                    mutation,
                    Mutation::Set("updatedAt", Value::String(now_iso.to_string())),
                ],
                UpdateCondition::Exists,
            )
            .await
            .map_err(|e| match e {
                doc_store::StoreError::ConditionFailed => {
                    AppError::NotFound("Admin not found".to_string())
                }
                other => other.into(),
            })?;
        Ok(())
    }
}

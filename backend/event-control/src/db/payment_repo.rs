//! Payment repository. Composite key (`paymentId`, `createdAt`) with
//! secondary indexes by event and by (event, viewer).

use std::sync::Arc;

use doc_store::{
    Document, DocumentStore, Key, KeyCondition, Mutation, PutCondition, QueryOptions, StoreError,
    UpdateCondition,
};
use serde_json::{json, Value};

use super::tables::{PAYMENTS_BY_EVENT, PAYMENTS_BY_EVENT_VIEWER};
use crate::error::{AppError, Result};
use crate::models::{Payment, PaymentStatus};

pub struct PaymentRepo {
    store: Arc<dyn DocumentStore>,
    table: String,
}

fn decode(doc: Document) -> Result<Payment> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::Storage(format!("corrupt payment document: {e}")))
}

impl PaymentRepo {
    pub fn new(store: Arc<dyn DocumentStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub async fn create(&self, payment: &Payment) -> Result<()> {
        let doc = match serde_json::to_value(payment)? {
            Value::Object(map) => map,
            _ => return Err(AppError::Internal("payment did not serialize to object".into())),
        };
        self.store
            .put(&self.table, doc, PutCondition::NotExists)
            .await
            .map_err(|e| match e {
                StoreError::ConditionFailed => {
                    AppError::Conflict("Payment already exists".to_string())
                }
                other => other.into(),
            })
    }

    pub async fn get(&self, payment_id: &str, created_at: &str) -> Result<Option<Payment>> {
        let doc = self
            .store
            .get(&self.table, &Key::composite(payment_id, created_at))
            .await?;
        doc.map(decode).transpose()
    }

    /// Transitions a pending payment to a new status, applying enrichment
    /// mutations in the same write. The conditional guard keeps terminal
    /// states sticky: returns `Ok(None)` when the guard rejects the write
    /// (some other delivery already finalized the payment).
    pub async fn transition_from_pending(
        &self,
        payment_id: &str,
        created_at: &str,
        next: PaymentStatus,
        mut extra: Vec<Mutation>,
        now_iso: &str,
    ) -> Result<Option<Payment>> {
        let mut mutations = vec![
            Mutation::Set("status", json!(next.as_str())),
            Mutation::Set("updatedAt", json!(now_iso)),
        ];
        mutations.append(&mut extra);
        let result = self
            .store
            .update(
                &self.table,
                &Key::composite(payment_id, created_at),
                mutations,
                UpdateCondition::AttrEquals("status", json!("pending")),
            )
            .await;
        match result {
            Ok(doc) => Ok(Some(decode(doc)?)),
            Err(StoreError::ConditionFailed) => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    /// Non-status enrichment of an existing payment (receipt URL, method
    /// details arriving on a replayed delivery).
    pub async fn enrich(
        &self,
        payment_id: &str,
        created_at: &str,
        mut extra: Vec<Mutation>,
        now_iso: &str,
    ) -> Result<()> {
        if extra.is_empty() {
            return Ok(());
        }
        extra.push(Mutation::Set("updatedAt", json!(now_iso)));
        self.store
            .update(
                &self.table,
                &Key::composite(payment_id, created_at),
                extra,
                UpdateCondition::Exists,
            )
            .await?;
        Ok(())
    }

    pub async fn list_by_event(
        &self,
        event_id: &str,
        limit: Option<usize>,
        cursor: Option<String>,
    ) -> Result<(Vec<Payment>, Option<String>)> {
        let page = self
            .store
            .query(
                &self.table,
                Some(PAYMENTS_BY_EVENT),
                KeyCondition::partition(event_id),
                QueryOptions {
                    limit,
                    cursor,
                    descending: true,
                    ..Default::default()
                },
            )
            .await?;
        let payments = page
            .items
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>>>()?;
        Ok((payments, page.next_cursor))
    }

    /// Most recent payment of a viewer for an event.
    pub async fn latest_for_viewer(
        &self,
        event_id: &str,
        client_viewer_id: &str,
    ) -> Result<Option<Payment>> {
        let page = self
            .store
            .query(
                &self.table,
                Some(PAYMENTS_BY_EVENT_VIEWER),
                KeyCondition::partition(event_id).with_sort(client_viewer_id),
                QueryOptions::default(),
            )
            .await?;
        let mut payments = page
            .items
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>>>()?;
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(payments.pop())
    }
}

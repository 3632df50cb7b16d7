//! In-memory document-store engine.
//!
//! Backs tests and local wiring. Each table is guarded by its own map entry,
//! so a conditional put or counter add observes and applies atomically with
//! respect to other writers of the same table.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dashmap::DashMap;
use serde_json::Value;

use crate::{
    document_key, Document, DocumentStore, Key, KeyCondition, Mutation, Page, PutCondition,
    QueryOptions, StoreError, StoreResult, TableSchema, UpdateCondition,
};

type RowKey = (String, String);

struct Table {
    schema: TableSchema,
    rows: BTreeMap<RowKey, Document>,
}

pub struct MemoryStore {
    tables: DashMap<String, Table>,
}

impl MemoryStore {
    pub fn new(schemas: Vec<TableSchema>) -> Self {
        let tables = DashMap::new();
        for schema in schemas {
            tables.insert(
                schema.name.clone(),
                Table {
                    schema,
                    rows: BTreeMap::new(),
                },
            );
        }
        Self { tables }
    }
}

fn row_key(key: &Key) -> RowKey {
    (key.partition.clone(), key.sort.clone().unwrap_or_default())
}

fn encode_cursor(key: &RowKey) -> String {
    BASE64.encode(serde_json::to_vec(key).unwrap_or_default())
}

fn decode_cursor(cursor: &str) -> StoreResult<RowKey> {
    let bytes = BASE64.decode(cursor).map_err(|_| StoreError::BadCursor)?;
    serde_json::from_slice(&bytes).map_err(|_| StoreError::BadCursor)
}

fn check_put_condition(
    existing: Option<&Document>,
    condition: &PutCondition,
) -> StoreResult<()> {
    match condition {
        PutCondition::None => Ok(()),
        PutCondition::NotExists => match existing {
            None => Ok(()),
            Some(_) => Err(StoreError::ConditionFailed),
        },
        PutCondition::AttrEquals(attr, expected) => match existing {
            Some(doc) if doc.get(*attr) == Some(expected) => Ok(()),
            _ => Err(StoreError::ConditionFailed),
        },
    }
}

fn check_update_condition(
    existing: Option<&Document>,
    condition: &UpdateCondition,
) -> StoreResult<()> {
    match condition {
        UpdateCondition::None => Ok(()),
        UpdateCondition::Exists => match existing {
            Some(_) => Ok(()),
            None => Err(StoreError::ConditionFailed),
        },
        UpdateCondition::AttrEquals(attr, expected) => match existing {
            Some(doc) if doc.get(*attr) == Some(expected) => Ok(()),
            _ => Err(StoreError::ConditionFailed),
        },
        UpdateCondition::AttrAbsentOrEquals(attr, expected) => match existing {
            Some(doc) => match doc.get(*attr) {
                None | Some(Value::Null) => Ok(()),
                Some(current) if current == expected => Ok(()),
                Some(_) => Err(StoreError::ConditionFailed),
            },
            None => Err(StoreError::ConditionFailed),
        },
    }
}

fn apply_mutations(doc: &mut Document, mutations: &[Mutation]) -> StoreResult<()> {
    for mutation in mutations {
        match mutation {
            Mutation::Set(attr, value) => {
                doc.insert((*attr).to_string(), value.clone());
            }
            Mutation::Remove(attr) => {
                doc.remove(*attr);
            }
            Mutation::Add(attr, delta) => {
                let current = match doc.get(*attr) {
                    None | Some(Value::Null) => 0.0,
                    Some(Value::Number(n)) => n
                        .as_f64()
                        .ok_or_else(|| StoreError::NotNumeric((*attr).to_string()))?,
                    Some(_) => return Err(StoreError::NotNumeric((*attr).to_string())),
                };
                let next = current + delta;
                // Whole results stay integers so counters round-trip into
                // integer-typed fields.
                let number = if next.fract() == 0.0 && next.abs() < i64::MAX as f64 {
                    serde_json::Number::from(next as i64)
                } else {
                    serde_json::Number::from_f64(next)
                        .ok_or_else(|| StoreError::NotNumeric((*attr).to_string()))?
                };
                doc.insert((*attr).to_string(), Value::Number(number));
            }
        }
    }
    Ok(())
}

/// Sorts index-query results by the index sort attribute (string order),
/// falling back to primary key for stability.
fn index_sort_value(doc: &Document, sort_attr: Option<&'static str>) -> String {
    sort_attr
        .and_then(|attr| doc.get(attr).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn paginate(
    mut matches: Vec<(RowKey, Document)>,
    options: &QueryOptions,
) -> StoreResult<Page> {
    if options.descending {
        matches.reverse();
    }
    let start = match &options.cursor {
        Some(cursor) => {
            let after = decode_cursor(cursor)?;
            match matches.iter().position(|(key, _)| *key == after) {
                Some(pos) => pos + 1,
                // Cursor row deleted since the last page; resume from the
                // first row past it.
                None => matches
                    .iter()
                    .position(|(key, _)| {
                        if options.descending {
                            *key < after
                        } else {
                            *key > after
                        }
                    })
                    .unwrap_or(matches.len()),
            }
        }
        None => 0,
    };
    let remaining = &matches[start.min(matches.len())..];
    let limit = options.limit.unwrap_or(usize::MAX);
    let page: Vec<_> = remaining.iter().take(limit).cloned().collect();
    let next_cursor = if page.len() < remaining.len() {
        page.last().map(|(key, _)| encode_cursor(key))
    } else {
        None
    };
    Ok(Page {
        items: page.into_iter().map(|(_, doc)| doc).collect(),
        next_cursor,
    })
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, table: &str, key: &Key) -> StoreResult<Option<Document>> {
        let table = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        Ok(table.rows.get(&row_key(key)).cloned())
    }

    async fn put(&self, table: &str, doc: Document, condition: PutCondition) -> StoreResult<()> {
        let mut table = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let key = document_key(&table.schema, &doc)?;
        let row = row_key(&key);
        check_put_condition(table.rows.get(&row), &condition)?;
        table.rows.insert(row, doc);
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        key: &Key,
        mutations: Vec<Mutation>,
        condition: UpdateCondition,
    ) -> StoreResult<Document> {
        let mut table = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let row = row_key(key);
        check_update_condition(table.rows.get(&row), &condition)?;

        let mut doc = table.rows.get(&row).cloned().unwrap_or_else(|| {
            // Upsert path: seed the key attributes so the new document is
            // addressable.
            let mut seeded = Document::new();
            seeded.insert(
                table.schema.partition_attr.to_string(),
                Value::String(key.partition.clone()),
            );
            if let (Some(attr), Some(sort)) = (table.schema.sort_attr, &key.sort) {
                seeded.insert(attr.to_string(), Value::String(sort.clone()));
            }
            seeded
        });
        apply_mutations(&mut doc, &mutations)?;
        table.rows.insert(row, doc.clone());
        Ok(doc)
    }

    async fn query(
        &self,
        table: &str,
        index: Option<&str>,
        key_condition: KeyCondition,
        options: QueryOptions,
    ) -> StoreResult<Page> {
        let table_ref = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let schema = &table_ref.schema;

        let (partition_attr, sort_attr) = match index {
            None => (schema.partition_attr, schema.sort_attr),
            Some(name) => {
                let idx = schema
                    .indexes
                    .iter()
                    .find(|idx| idx.name == name)
                    .ok_or_else(|| StoreError::UnknownIndex {
                        table: table.to_string(),
                        index: name.to_string(),
                    })?;
                (idx.partition_attr, idx.sort_attr)
            }
        };

        let filter = options.filter.clone();
        let mut matches: Vec<(RowKey, Document)> = table_ref
            .rows
            .iter()
            .filter(|(_, doc)| doc.get(partition_attr) == Some(&key_condition.partition))
            .filter(|(_, doc)| match (&key_condition.sort, sort_attr) {
                (Some(expected), Some(attr)) => doc.get(attr) == Some(expected),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|(_, doc)| filter.as_ref().map(|f| f.matches(doc)).unwrap_or(true))
            .map(|(key, doc)| (key.clone(), doc.clone()))
            .collect();

        if index.is_some() {
            matches.sort_by(|(ka, a), (kb, b)| {
                index_sort_value(a, sort_attr)
                    .cmp(&index_sort_value(b, sort_attr))
                    .then_with(|| ka.cmp(kb))
            });
        }
        drop(table_ref);
        paginate(matches, &options)
    }

    async fn scan(&self, table: &str, options: QueryOptions) -> StoreResult<Page> {
        let table_ref = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let filter = options.filter.clone();
        let matches: Vec<(RowKey, Document)> = table_ref
            .rows
            .iter()
            .filter(|(_, doc)| filter.as_ref().map(|f| f.matches(doc)).unwrap_or(true))
            .map(|(key, doc)| (key.clone(), doc.clone()))
            .collect();
        drop(table_ref);
        paginate(matches, &options)
    }

    async fn delete(&self, table: &str, key: &Key) -> StoreResult<()> {
        let mut table = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        table.rows.remove(&row_key(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Filter;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            TableSchema::new("payments", "paymentId")
                .with_sort("createdAt")
                .with_index("byEvent", "eventId", Some("createdAt")),
            TableSchema::new("sessions", "sessionId"),
        ])
    }

    fn payment(id: &str, created_at: &str, event_id: &str, status: &str) -> Document {
        json!({
            "paymentId": id,
            "createdAt": created_at,
            "eventId": event_id,
            "status": status,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[tokio::test]
    async fn conditional_put_rejects_duplicates() {
        let store = store();
        let doc = payment("p1", "t1", "e1", "pending");
        store
            .put("payments", doc.clone(), PutCondition::NotExists)
            .await
            .unwrap();
        let err = store
            .put("payments", doc, PutCondition::NotExists)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[tokio::test]
    async fn conditional_update_guards_attribute_value() {
        let store = store();
        store
            .put("payments", payment("p1", "t1", "e1", "pending"), PutCondition::None)
            .await
            .unwrap();
        let key = Key::composite("p1", "t1");

        let updated = store
            .update(
                "payments",
                &key,
                vec![Mutation::Set("status", json!("succeeded"))],
                UpdateCondition::AttrEquals("status", json!("pending")),
            )
            .await
            .unwrap();
        assert_eq!(updated.get("status"), Some(&json!("succeeded")));

        // Terminal guard: a second transition away from pending fails.
        let err = store
            .update(
                "payments",
                &key,
                vec![Mutation::Set("status", json!("canceled"))],
                UpdateCondition::AttrEquals("status", json!("pending")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[tokio::test]
    async fn atomic_add_accumulates() {
        let store = store();
        let key = Key::partition("s1");
        store
            .update(
                "sessions",
                &key,
                vec![Mutation::Add("duration", 10.0)],
                UpdateCondition::None,
            )
            .await
            .unwrap();
        let doc = store
            .update(
                "sessions",
                &key,
                vec![Mutation::Add("duration", 32.0)],
                UpdateCondition::None,
            )
            .await
            .unwrap();
        assert_eq!(doc.get("duration").and_then(Value::as_f64), Some(42.0));
    }

    #[tokio::test]
    async fn index_query_filters_and_paginates() {
        let store = store();
        for i in 0..5 {
            store
                .put(
                    "payments",
                    payment(&format!("p{i}"), &format!("t{i}"), "e1", "pending"),
                    PutCondition::None,
                )
                .await
                .unwrap();
        }
        store
            .put("payments", payment("px", "t9", "e2", "pending"), PutCondition::None)
            .await
            .unwrap();

        let first = store
            .query(
                "payments",
                Some("byEvent"),
                KeyCondition::partition("e1"),
                QueryOptions {
                    limit: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first.items.len(), 3);
        let cursor = first.next_cursor.expect("more pages");

        let rest = store
            .query(
                "payments",
                Some("byEvent"),
                KeyCondition::partition("e1"),
                QueryOptions {
                    limit: Some(10),
                    cursor: Some(cursor),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 2);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn scan_supports_contains_filter() {
        let store = store();
        let mut doc = payment("p1", "t1", "e1", "pending");
        doc.insert("title".into(), json!("Quarterly Townhall"));
        store.put("payments", doc, PutCondition::None).await.unwrap();

        let hit = store
            .scan(
                "payments",
                QueryOptions {
                    filter: Some(Filter::default().contains("title", "townhall")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hit.items.len(), 1);

        let miss = store
            .scan(
                "payments",
                QueryOptions {
                    filter: Some(Filter::default().contains("title", "webinar")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(miss.items.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = store();
        let key = Key::composite("p1", "t1");
        store
            .put("payments", payment("p1", "t1", "e1", "pending"), PutCondition::None)
            .await
            .unwrap();
        store.delete("payments", &key).await.unwrap();
        store.delete("payments", &key).await.unwrap();
        assert!(store.get("payments", &key).await.unwrap().is_none());
    }
}

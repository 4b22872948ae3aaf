//! Keyed JSON document persistence with merge-on-write semantics.
//!
//! Each `merge` is atomic for a single document. Writes to different
//! documents are independent; callers get no cross-document transaction.

use async_trait::async_trait;
use sea_orm::{
    entity::*, query::*, sea_query::OnConflict, ActiveValue::Set, DatabaseConnection, DbErr,
    TransactionTrait,
};
use serde_json::Value;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::Result;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` if it was never written
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Deep-merge `patch` into the document, creating it if needed
    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<()>;
}

/// Merge `patch` into `target`.
///
/// Objects merge key by key and recurse into nested objects; any other
/// value in the patch replaces what was there.
pub fn merge_document(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                let both_objects =
                    value.is_object() && target.get(&key).is_some_and(Value::is_object);

                if both_objects {
                    if let Some(existing) = target.get_mut(&key) {
                        merge_document(existing, value);
                    }
                } else {
                    target.insert(key, value);
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Postgres-backed store on the `documents` table
pub struct PostgresDocumentStore {
    db: DatabaseConnection,
}

impl PostgresDocumentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let document = entity::documents::Entity::find_by_id((collection.to_string(), id.to_string()))
            .one(&self.db)
            .await?;

        Ok(document.map(|document| document.data))
    }

    #[instrument(skip(self, patch))]
    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let txn = self.db.begin().await?;
        let now = OffsetDateTime::now_utc();

        // Make sure the row exists so it can be locked; concurrent creators collapse here
        let placeholder = entity::documents::ActiveModel {
            collection: Set(collection.to_string()),
            id: Set(id.to_string()),
            data: Set(Value::Object(Default::default())),
            created_at: Set(now),
            updated_at: Set(now),
        };
        entity::documents::Entity::insert(placeholder)
            .on_conflict(
                OnConflict::columns([
                    entity::documents::Column::Collection,
                    entity::documents::Column::Id,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        let existing = entity::documents::Entity::find_by_id((collection.to_string(), id.to_string()))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("{}/{}", collection, id)))?;

        let mut data = existing.data.clone();
        merge_document(&mut data, patch);

        let mut document: entity::documents::ActiveModel = existing.into();
        document.data = Set(data);
        document.updated_at = Set(now);
        document.update(&txn).await?;

        txn.commit().await?;

        debug!("Merged document {}/{}", collection, id);

        Ok(())
    }
}

/// In-process store for tests
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), Value>>,
    merges: RwLock<Vec<(String, String)>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(collection, id)` merged so far, in write order
    pub async fn merge_log(&self) -> Vec<(String, String)> {
        self.merges.read().await.clone()
    }

    /// Number of documents currently held in `collection`
    pub async fn count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let key = (collection.to_string(), id.to_string());

        let mut documents = self.documents.write().await;
        let document = documents
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Default::default()));
        merge_document(document, patch);
        drop(documents);

        self.merges.write().await.push(key);
        Ok(())
    }
}

//! In-process document store
//!
//! Collections live in a shared [`DashMap`]; each collection keeps documents in
//! insertion order and enforces its unique indexes under the shard lock, so a
//! single insert, update or delete is atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use super::document::{document_id, Document, ID_FIELD, VERSION_FIELD};
use super::error::{RepositoryError, RepositoryOperation};
use super::filter::Filter;
use super::find::FindQuery;
use super::traits::{DocumentStore, RepositoryResult};

#[derive(Debug, Default)]
struct Collection {
    /// Documents keyed by insertion sequence
    documents: BTreeMap<u64, Document>,
    /// Identifier to insertion sequence
    index: HashMap<String, u64>,
    /// Fields carrying a unique index
    unique: Vec<String>,
}

impl Collection {
    fn check_unique(
        &self,
        candidate: &Document,
        own_id: Option<&str>,
        operation: RepositoryOperation,
    ) -> RepositoryResult<()> {
        for field in &self.unique {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self.documents.values().any(|existing| {
                document_id(existing) != own_id && existing.get(field) == Some(value)
            });
            if clash {
                let shown = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                return Err(RepositoryError::duplicate_key(operation, field.clone(), shown));
            }
        }
        Ok(())
    }
}

/// Shared in-memory [`DocumentStore`]
///
/// Cloning is cheap; clones share the same collections.
///
/// # Example
///
/// ```rust,ignore
/// use serde_json::json;
/// use tour_service::repository::{DocumentStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// let doc = json!({"_id": "tour_1", "name": "The Park Camper"});
/// let stored = store.insert("tours", doc.as_object().cloned().unwrap()).await?;
/// assert_eq!(stored["__v"], 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<DashMap<String, Collection>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    /// True when the collection holds no documents
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl DocumentStore for MemoryStore {
    async fn ensure_unique(&self, collection: &str, field: &str) -> RepositoryResult<()> {
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        if entry.unique.iter().any(|f| f == field) {
            return Ok(());
        }

        let mut seen: Vec<&Value> = Vec::new();
        for doc in entry.documents.values() {
            if let Some(value) = doc.get(field).filter(|v| !v.is_null()) {
                if seen.contains(&value) {
                    return Err(RepositoryError::duplicate_key(
                        RepositoryOperation::Index,
                        field,
                        value.to_string(),
                    ));
                }
                seen.push(value);
            }
        }

        entry.unique.push(field.to_string());
        tracing::debug!(collection, field, "unique index declared");
        Ok(())
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> RepositoryResult<Vec<Document>> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| query.run(c.documents.values()))
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> RepositoryResult<u64> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.documents.values().filter(|doc| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> RepositoryResult<Option<Document>> {
        Ok(self.collections.get(collection).and_then(|c| {
            c.index
                .get(id)
                .and_then(|seq| c.documents.get(seq))
                .cloned()
        }))
    }

    async fn insert(&self, collection: &str, mut document: Document) -> RepositoryResult<Document> {
        let id = document_id(&document)
            .ok_or_else(|| {
                RepositoryError::invalid_document(
                    RepositoryOperation::Insert,
                    format!("document is missing a string `{}`", ID_FIELD),
                )
            })?
            .to_string();

        let mut entry = self.collections.entry(collection.to_string()).or_default();
        if entry.index.contains_key(&id) {
            return Err(RepositoryError::duplicate_key(
                RepositoryOperation::Insert,
                ID_FIELD,
                id,
            ));
        }
        entry.check_unique(&document, None, RepositoryOperation::Insert)?;

        document.insert(VERSION_FIELD.to_string(), Value::from(0));
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        entry.index.insert(id.clone(), seq);
        entry.documents.insert(seq, document.clone());

        tracing::debug!(collection, id = %id, "document inserted");
        Ok(document)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> RepositoryResult<Option<Document>> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(seq) = entry.index.get(id).copied() else {
            return Ok(None);
        };
        let Some(mut updated) = entry.documents.get(&seq).cloned() else {
            return Ok(None);
        };

        for (field, value) in changes {
            if field == ID_FIELD || field == VERSION_FIELD {
                continue;
            }
            if value.is_null() {
                updated.remove(&field);
            } else {
                updated.insert(field, value);
            }
        }
        let revision = updated.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0);
        updated.insert(VERSION_FIELD.to_string(), Value::from(revision + 1));

        entry.check_unique(&updated, Some(id), RepositoryOperation::Update)?;
        entry.documents.insert(seq, updated.clone());

        tracing::debug!(collection, id, revision = revision + 1, "document updated");
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> RepositoryResult<Option<Document>> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(None);
        };
        let removed = entry
            .index
            .remove(id)
            .and_then(|seq| entry.documents.remove(&seq));
        if removed.is_some() {
            tracing::debug!(collection, id, "document deleted");
        }
        Ok(removed)
    }
}

//! Relation population
//!
//! Resolves the [`Populate`] directives of a model against the store. The
//! related model's decorator filters what can be populated, its own
//! directives are resolved recursively and its presentation is applied.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::Result;
use crate::models::{Populate, PopulateKind};
use crate::repository::{
    document_id, Document, DocumentStore, FilterCondition, FindQuery, ID_FIELD,
};

/// Nesting depth at which population stops
pub const MAX_POPULATE_DEPTH: usize = 3;

/// Resolve every directive on one document
pub fn populate_document<'a, S: DocumentStore>(
    store: &'a S,
    doc: Document,
    directives: &'a [Populate],
    depth: usize,
) -> BoxFuture<'a, Result<Document>> {
    async move {
        let mut doc = doc;
        if depth >= MAX_POPULATE_DEPTH {
            return Ok(doc);
        }
        for directive in directives {
            doc = resolve(store, doc, directive, depth).await?;
        }
        Ok(doc)
    }
    .boxed()
}

/// Resolve every directive on a sequence of documents
pub async fn populate_all<S: DocumentStore>(
    store: &S,
    docs: Vec<Document>,
    directives: &[Populate],
) -> Result<Vec<Document>> {
    if directives.is_empty() {
        return Ok(docs);
    }
    try_join_all(
        docs.into_iter()
            .map(|doc| populate_document(store, doc, directives, 0)),
    )
    .await
}

fn related_query(directive: &Populate, condition: FilterCondition) -> FindQuery {
    let query = FindQuery::new()
        .with_filter((directive.decorate)())
        .with_filter(condition.into());
    match &directive.projection {
        Some(projection) => query.with_projection(projection.clone()),
        None => query,
    }
}

async fn finish_related<S: DocumentStore>(
    store: &S,
    related: Vec<Document>,
    directive: &Populate,
    depth: usize,
) -> Result<Vec<Document>> {
    let nested = (directive.nested)();
    let mut finished = Vec::with_capacity(related.len());
    for doc in related {
        let doc = populate_document(store, doc, &nested, depth + 1).await?;
        finished.push((directive.present)(doc));
    }
    Ok(finished)
}

async fn resolve<S: DocumentStore>(
    store: &S,
    mut doc: Document,
    directive: &Populate,
    depth: usize,
) -> Result<Document> {
    match &directive.kind {
        PopulateKind::Reference { path } => {
            let replacement = match doc.get(*path) {
                Some(Value::String(id)) => {
                    let query = related_query(directive, FilterCondition::eq(ID_FIELD, id.as_str()));
                    let found = store.find(directive.collection, &query).await?;
                    let mut found = finish_related(store, found, directive, depth).await?;
                    Some(found.pop().map(Value::Object).unwrap_or(Value::Null))
                }
                Some(Value::Array(items)) => {
                    let ids: Vec<Value> = items.iter().filter(|v| v.is_string()).cloned().collect();
                    let query = related_query(directive, FilterCondition::in_values(ID_FIELD, ids.clone()));
                    let found = store.find(directive.collection, &query).await?;
                    let found = finish_related(store, found, directive, depth).await?;
                    // Keep the order of the stored ids
                    let ordered = ids
                        .iter()
                        .filter_map(|id| {
                            found
                                .iter()
                                .find(|doc| document_id(doc) == id.as_str())
                                .cloned()
                                .map(Value::Object)
                        })
                        .collect();
                    Some(Value::Array(ordered))
                }
                _ => None,
            };
            if let Some(value) = replacement {
                doc.insert((*path).to_string(), value);
            }
        }
        PopulateKind::Virtual {
            name,
            foreign_field,
        } => {
            if let Some(id) = document_id(&doc).map(str::to_string) {
                let query = related_query(directive, FilterCondition::eq(*foreign_field, id));
                let found = store.find(directive.collection, &query).await?;
                let found = finish_related(store, found, directive, depth).await?;
                doc.insert(
                    (*name).to_string(),
                    Value::Array(found.into_iter().map(Value::Object).collect()),
                );
            }
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, Review, Tour, User};
    use crate::repository::MemoryStore;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let users = [
            json!({ "_id": "user_1", "name": "Lourdes", "photo": "u1.jpg", "role": "guide", "password": "x", "passwordChangedAt": "2020-01-01T00:00:00.000Z" }),
            json!({ "_id": "user_2", "name": "Miyah", "photo": "u2.jpg", "role": "lead-guide", "password": "x" }),
            json!({ "_id": "user_3", "name": "Gone", "active": false }),
        ];
        for user in users {
            store.insert(User::COLLECTION, doc(user)).await.unwrap();
        }
        store
            .insert(
                Tour::COLLECTION,
                doc(json!({ "_id": "tour_1", "name": "The Forest Hiker", "duration": 7, "guides": ["user_2", "user_1", "user_3"] })),
            )
            .await
            .unwrap();
        store
            .insert(
                Review::COLLECTION,
                doc(json!({ "_id": "review_1", "review": "Great", "rating": 5, "tour": "tour_1", "user": "user_2" })),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_reference_array_keeps_order_and_decorators() {
        let store = seeded().await;
        let tour = store.find_by_id("tours", "tour_1").await.unwrap().unwrap();
        let tour = populate_document(&store, tour, &Tour::populate(), 0).await.unwrap();

        let guides = tour["guides"].as_array().unwrap();
        assert_eq!(guides.len(), 2);
        assert_eq!(guides[0]["name"], "Miyah");
        assert_eq!(guides[1]["name"], "Lourdes");
        assert!(guides[1].get("passwordChangedAt").is_none());
        assert!(guides[1].get("password").is_none());
        assert!(guides[1].get("__v").is_none());
    }

    #[tokio::test]
    async fn test_virtual_with_nested_reference() {
        let store = seeded().await;
        let tour = store.find_by_id("tours", "tour_1").await.unwrap().unwrap();
        let directives = [Populate::virtual_field::<Review>("reviews", "tour")];
        let tour = populate_document(&store, tour, &directives, 0).await.unwrap();

        let reviews = tour["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(
            reviews[0]["user"],
            json!({ "_id": "user_2", "name": "Miyah", "photo": "u2.jpg" })
        );
    }

    #[tokio::test]
    async fn test_missing_reference_becomes_null() {
        let store = seeded().await;
        let review = doc(json!({ "_id": "review_9", "user": "user_404" }));
        let review = populate_document(&store, review, &Review::populate(), 0).await.unwrap();
        assert_eq!(review["user"], Value::Null);
    }
}

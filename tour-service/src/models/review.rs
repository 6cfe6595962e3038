//! Reviews
//!
//! Writing a review refreshes the rating summary stored on its tour.

use serde_json::{Number, Value};

use super::{merge_changes, writable_fields, Populate, Resource, Tour, User, Validator, WriteContext};
use crate::error::{Error, Result};
use crate::repository::{Document, DocumentStore, Filter, FilterCondition, FindQuery};

/// A user's review of a tour
#[derive(Debug, Clone, Copy, Default)]
pub struct Review;

impl Review {
    /// Fields an update may change; a review never moves to another tour or author
    pub const EDITABLE_FIELDS: &'static [&'static str] = &["review", "rating"];
}

/// Rating count and average over a set of reviews
///
/// With no ratings the tour falls back to `(0, 4.5)`.
pub fn rating_summary(reviews: &[Document]) -> (u64, f64) {
    let ratings: Vec<f64> = reviews
        .iter()
        .filter_map(|r| r.get("rating").and_then(Value::as_f64))
        .collect();
    if ratings.is_empty() {
        return (0, 4.5);
    }
    let average = ratings.iter().sum::<f64>() / ratings.len() as f64;
    (ratings.len() as u64, (average * 10.0).round() / 10.0)
}

impl Resource for Review {
    const SINGULAR: &'static str = "review";
    const COLLECTION: &'static str = "reviews";
    const ID_PREFIX: &'static str = "review";
    const FIELDS: &'static [&'static str] = &["review", "rating", "createdAt", "tour", "user"];

    fn normalize(doc: &mut Document) {
        if let Some(Value::String(text)) = doc.get_mut("review") {
            *text = text.trim().to_string();
        }
    }

    fn defaults(doc: &mut Document, ctx: &WriteContext<'_>) {
        doc.entry("createdAt")
            .or_insert_with(|| Value::String(ctx.timestamp()));
    }

    fn validate(doc: &Document) -> Result<()> {
        Validator::new(doc)
            .required("review", "Review can not be empty!")
            .string("review")
            .number("rating")
            .range("rating", 1.0, 5.0, "Rating must be between 1 and 5")
            .required("tour", "Review must belong to a tour.")
            .string("tour")
            .required("user", "Review must belong to a user")
            .string("user")
            .finish()
    }

    fn prepare_update(
        current: &Document,
        changes: Document,
        _ctx: &WriteContext<'_>,
    ) -> Result<Document> {
        let mut changes = writable_fields(changes, Self::EDITABLE_FIELDS);
        Self::normalize(&mut changes);
        Self::validate(&merge_changes(current, &changes))?;
        Ok(changes)
    }

    /// One review per user and tour
    async fn check_conflicts<S: DocumentStore>(store: &S, doc: &Document) -> Result<()> {
        let (Some(tour), Some(user)) = (doc.get("tour"), doc.get("user")) else {
            return Ok(());
        };
        let existing = Filter::new()
            .and(FilterCondition::eq("tour", tour.clone()))
            .and(FilterCondition::eq("user", user.clone()));
        if store.count(Self::COLLECTION, &existing).await? > 0 {
            return Err(Error::DuplicateKey {
                field: "tour, user".to_string(),
                value: format!("{}, {}", tour.as_str().unwrap_or_default(), user.as_str().unwrap_or_default()),
            });
        }
        Ok(())
    }

    /// Recompute `ratingsQuantity` and `ratingsAverage` on the reviewed tour
    async fn after_write<S: DocumentStore>(store: &S, doc: &Document) -> Result<()> {
        let Some(tour_id) = doc.get("tour").and_then(Value::as_str) else {
            return Ok(());
        };
        let query = FindQuery::new().with_filter(FilterCondition::eq("tour", tour_id).into());
        let reviews = store.find(Self::COLLECTION, &query).await?;
        let (quantity, average) = rating_summary(&reviews);

        let mut changes = Document::new();
        changes.insert("ratingsQuantity".to_string(), Value::from(quantity));
        if let Some(average) = Number::from_f64(average) {
            changes.insert("ratingsAverage".to_string(), Value::Number(average));
        }
        store.update_by_id(Tour::COLLECTION, tour_id, changes).await?;
        tracing::debug!(tour = tour_id, quantity, average, "tour ratings refreshed");
        Ok(())
    }

    fn populate() -> Vec<Populate> {
        vec![Populate::reference::<User>("user").select(&["name", "photo"])]
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{doc, hasher};
    use super::*;
    use crate::repository::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_rating_summary() {
        let reviews = vec![
            doc(json!({ "rating": 5 })),
            doc(json!({ "rating": 4 })),
            doc(json!({ "rating": 4 })),
        ];
        assert_eq!(rating_summary(&reviews), (3, 4.3));
        assert_eq!(rating_summary(&[]), (0, 4.5));
    }

    #[test]
    fn test_validate() {
        let missing = doc(json!({ "rating": 7 }));
        match Review::validate(&missing) {
            Err(Error::ValidationFailed(msg)) => {
                assert!(msg.contains("Review can not be empty!"));
                assert!(msg.contains("Rating must be between 1 and 5"));
                assert!(msg.contains("Review must belong to a tour."));
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_after_write_updates_tour() {
        let store = MemoryStore::new();
        store
            .insert("tours", doc(json!({ "_id": "tour_1", "ratingsQuantity": 0 })))
            .await
            .unwrap();
        for (id, rating) in [("review_1", 5), ("review_2", 3)] {
            store
                .insert(
                    "reviews",
                    doc(json!({ "_id": id, "tour": "tour_1", "user": id, "rating": rating })),
                )
                .await
                .unwrap();
        }

        Review::after_write(&store, &doc(json!({ "tour": "tour_1" }))).await.unwrap();

        let tour = store.find_by_id("tours", "tour_1").await.unwrap().unwrap();
        assert_eq!(tour["ratingsQuantity"], json!(2));
        assert_eq!(tour["ratingsAverage"], json!(4.0));
    }

    #[tokio::test]
    async fn test_one_review_per_user_and_tour() {
        let store = MemoryStore::new();
        let review = doc(json!({ "_id": "review_1", "tour": "tour_1", "user": "user_1" }));
        assert!(Review::check_conflicts(&store, &review).await.is_ok());
        store.insert("reviews", review.clone()).await.unwrap();
        assert!(matches!(
            Review::check_conflicts(&store, &review).await,
            Err(Error::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_update_keeps_tour_and_author() {
        let current = doc(json!({ "review": "Fine", "rating": 3, "tour": "tour_b", "user": "user_1" }));
        let changes = Review::prepare_update(
            &current,
            doc(json!({ "tour": "tour_a", "user": "user_2", "rating": 5 })),
            &WriteContext::new(&hasher()),
        )
        .unwrap();
        assert_eq!(changes, doc(json!({ "rating": 5 })));
    }
}

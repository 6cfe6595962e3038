//! Bookings

use serde_json::Value;

use super::{Populate, Resource, Tour, User, Validator, WriteContext};
use crate::error::Result;
use crate::repository::Document;

/// A paid reservation of a tour by a user
#[derive(Debug, Clone, Copy, Default)]
pub struct Booking;

impl Resource for Booking {
    const SINGULAR: &'static str = "booking";
    const COLLECTION: &'static str = "bookings";
    const ID_PREFIX: &'static str = "booking";
    const FIELDS: &'static [&'static str] = &["tour", "user", "price", "createdAt", "paid"];

    fn defaults(doc: &mut Document, ctx: &WriteContext<'_>) {
        doc.entry("createdAt")
            .or_insert_with(|| Value::String(ctx.timestamp()));
        doc.entry("paid").or_insert(Value::Bool(true));
    }

    fn validate(doc: &Document) -> Result<()> {
        Validator::new(doc)
            .required("tour", "Booking must belong to a Tour!")
            .string("tour")
            .required("user", "Booking must belong to a User!")
            .string("user")
            .required("price", "Booking must have a price.")
            .number("price")
            .boolean("paid")
            .finish()
    }

    fn populate() -> Vec<Populate> {
        vec![
            Populate::reference::<User>("user"),
            Populate::reference::<Tour>("tour").select(&["name"]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{doc, hasher};
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn test_prepare_create() {
        let hasher = hasher();
        let ctx = WriteContext::new(&hasher);
        let booking = Booking::prepare_create(
            doc(json!({ "tour": "tour_1", "user": "user_1", "price": 497 })),
            &ctx,
        )
        .unwrap();
        assert!(booking["_id"].as_str().unwrap().starts_with("booking_"));
        assert_eq!(booking["paid"], json!(true));
    }

    #[test]
    fn test_price_required() {
        let hasher = hasher();
        let ctx = WriteContext::new(&hasher);
        match Booking::prepare_create(doc(json!({ "tour": "tour_1", "user": "user_1" })), &ctx) {
            Err(Error::ValidationFailed(msg)) => assert_eq!(msg, "Booking must have a price."),
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_populate_directives() {
        let populate = Booking::populate();
        assert_eq!(populate.len(), 2);
        assert_eq!(populate[1].collection, "tours");
    }
}

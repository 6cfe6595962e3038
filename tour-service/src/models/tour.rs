//! Tours

use serde_json::{Number, Value};

use super::{Populate, Resource, User, Validator, WriteContext};
use crate::error::Result;
use crate::repository::{Document, Filter, FilterCondition};

/// Accepted difficulty levels
pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

/// A bookable tour
#[derive(Debug, Clone, Copy, Default)]
pub struct Tour;

/// URL-safe slug of a tour name
///
/// ```rust
/// use tour_service::models::slugify;
///
/// assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
/// assert_eq!(slugify("  Sea & Sky: 2 days! "), "sea-sky-2-days");
/// ```
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn is_point(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let type_ok = obj.get("type").map_or(true, |t| t == "Point");
    let coords_ok = obj
        .get("coordinates")
        .and_then(Value::as_array)
        .is_some_and(|c| c.len() == 2 && c.iter().all(Value::is_number));
    type_ok && coords_ok
}

fn is_string_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

impl Resource for Tour {
    const SINGULAR: &'static str = "tour";
    const COLLECTION: &'static str = "tours";
    const ID_PREFIX: &'static str = "tour";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "duration",
        "maxGroupSize",
        "difficulty",
        "ratingsAverage",
        "ratingsQuantity",
        "price",
        "priceDiscount",
        "summary",
        "description",
        "imageCover",
        "images",
        "createdAt",
        "startDates",
        "secretTour",
        "startLocation",
        "locations",
        "guides",
    ];
    const UNIQUE: &'static [&'static str] = &["name"];

    fn normalize(doc: &mut Document) {
        for field in ["name", "summary", "description"] {
            if let Some(Value::String(s)) = doc.get_mut(field) {
                *s = s.trim().to_string();
            }
        }
        if let Some(name) = doc.get("name").and_then(Value::as_str) {
            let slug = slugify(name);
            doc.insert("slug".to_string(), Value::String(slug));
        }
        // Ratings are kept to one decimal place
        if let Some(rating) = doc.get("ratingsAverage").and_then(Value::as_f64) {
            if let Some(rounded) = Number::from_f64((rating * 10.0).round() / 10.0) {
                doc.insert("ratingsAverage".to_string(), Value::Number(rounded));
            }
        }
        if let Some(Value::Object(point)) = doc.get_mut("startLocation") {
            point
                .entry("type")
                .or_insert_with(|| Value::String("Point".to_string()));
        }
    }

    fn defaults(doc: &mut Document, ctx: &WriteContext<'_>) {
        let defaults = [
            ("ratingsAverage", Value::from(4.5)),
            ("ratingsQuantity", Value::from(0)),
            ("secretTour", Value::Bool(false)),
            ("createdAt", Value::String(ctx.timestamp())),
            ("images", Value::Array(Vec::new())),
            ("startDates", Value::Array(Vec::new())),
            ("locations", Value::Array(Vec::new())),
            ("guides", Value::Array(Vec::new())),
        ];
        for (field, value) in defaults {
            doc.entry(field).or_insert(value);
        }
    }

    fn validate(doc: &Document) -> Result<()> {
        let mut v = Validator::new(doc);
        v.required("name", "A tour must have a name")
            .string("name")
            .length("name", 10, 40, "A tour name must have between 10 and 40 characters")
            .required("duration", "A tour must have a duration")
            .number("duration")
            .required("maxGroupSize", "A tour must have a group size")
            .number("maxGroupSize")
            .required("difficulty", "A tour must have a difficulty")
            .one_of("difficulty", &DIFFICULTIES, "Difficulty is either: easy, medium, difficult")
            .number("ratingsAverage")
            .range("ratingsAverage", 1.0, 5.0, "Rating must be between 1.0 and 5.0")
            .number("ratingsQuantity")
            .required("price", "A tour must have a price")
            .number("price")
            .number("priceDiscount")
            .string("summary")
            .string("description")
            .required("imageCover", "A tour must have a cover image")
            .string("imageCover")
            .boolean("secretTour");

        if let (Some(discount), Some(price)) = (
            doc.get("priceDiscount").and_then(Value::as_f64),
            doc.get("price").and_then(Value::as_f64),
        ) {
            v.check(
                discount < price,
                &format!("Discount price ({}) should be below regular price", discount),
            );
        }
        if let Some(location) = doc.get("startLocation").filter(|l| !l.is_null()) {
            v.check(
                is_point(location),
                "startLocation must be a GeoJSON point with [longitude, latitude] coordinates",
            );
        }
        if let Some(locations) = doc.get("locations").and_then(Value::as_array) {
            v.check(
                locations.iter().all(is_point),
                "Every location must be a GeoJSON point with [longitude, latitude] coordinates",
            );
        }
        for field in ["guides", "images", "startDates"] {
            if let Some(value) = doc.get(field) {
                v.check(is_string_array(value), &format!("{} must be a list of strings", field));
            }
        }
        v.finish()
    }

    fn decorate() -> Filter {
        FilterCondition::ne("secretTour", true).into()
    }

    fn populate() -> Vec<Populate> {
        vec![Populate::reference::<User>("guides").exclude(&["passwordChangedAt", "__v"])]
    }

    fn present(doc: Document) -> Document {
        let mut doc = super::strip_fields(doc, Self::HIDDEN);
        if let Some(weeks) = doc
            .get("duration")
            .and_then(Value::as_f64)
            .and_then(|d| Number::from_f64(d / 7.0))
        {
            doc.insert("durationWeeks".to_string(), Value::Number(weeks));
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{doc, hasher};
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn payload() -> Document {
        doc(json!({
            "name": "  The Forest Hiker ",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": " Breathtaking hike through the Canadian Banff National Park ",
            "imageCover": "tour-1-cover.jpg",
            "ratingsAverage": 4.66,
            "startLocation": { "coordinates": [-115.570154, 51.178456] }
        }))
    }

    #[test]
    fn test_prepare_create_applies_defaults() {
        let hasher = hasher();
        let ctx = WriteContext::new(&hasher);
        let tour = Tour::prepare_create(payload(), &ctx).unwrap();

        assert!(tour["_id"].as_str().unwrap().starts_with("tour_"));
        assert_eq!(tour["name"], "The Forest Hiker");
        assert_eq!(tour["slug"], "the-forest-hiker");
        assert_eq!(tour["ratingsAverage"], json!(4.7));
        assert_eq!(tour["ratingsQuantity"], json!(0));
        assert_eq!(tour["secretTour"], json!(false));
        assert_eq!(tour["startLocation"]["type"], "Point");
        assert!(tour["createdAt"].is_string());
    }

    #[test]
    fn test_missing_required_fields() {
        let hasher = hasher();
        let ctx = WriteContext::new(&hasher);
        let mut body = payload();
        body.remove("price");
        body.remove("imageCover");

        match Tour::prepare_create(body, &ctx) {
            Err(Error::ValidationFailed(msg)) => {
                assert!(msg.contains("A tour must have a price"));
                assert!(msg.contains("A tour must have a cover image"));
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_discount_must_be_below_price() {
        let hasher = hasher();
        let ctx = WriteContext::new(&hasher);
        let mut body = payload();
        body.insert("priceDiscount".into(), json!(500));
        assert!(matches!(
            Tour::prepare_create(body, &ctx),
            Err(Error::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_update_validates_merged_document() {
        let hasher = hasher();
        let ctx = WriteContext::new(&hasher);
        let current = Tour::prepare_create(payload(), &ctx).unwrap();

        let lowered = doc(json!({ "price": 100, "priceDiscount": 150 }));
        assert!(Tour::prepare_update(&current, lowered, &ctx).is_err());

        let renamed = doc(json!({ "name": "The Sea Explorer", "slug": "ignored" }));
        let changes = Tour::prepare_update(&current, renamed, &ctx).unwrap();
        assert_eq!(changes["slug"], "the-sea-explorer");
    }

    #[test]
    fn test_present_adds_duration_weeks() {
        let presented = Tour::present(doc(json!({ "_id": "tour_1", "duration": 14 })));
        assert_eq!(presented["durationWeeks"], json!(2.0));

        let without = Tour::present(doc(json!({ "_id": "tour_1" })));
        assert!(!without.contains_key("durationWeeks"));
    }

    #[test]
    fn test_decorate_hides_secret_tours() {
        let filter = Tour::decorate();
        assert!(filter.matches(&doc(json!({ "secretTour": false }))));
        assert!(filter.matches(&doc(json!({}))));
        assert!(!filter.matches(&doc(json!({ "secretTour": true }))));
    }
}

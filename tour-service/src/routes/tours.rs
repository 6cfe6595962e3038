//! Tour routes: CRUD, aliases, aggregates and geo queries

use std::cmp::Ordering;
use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::{Map, Number, Value};

use super::{guarded, reviews, STAFF};
use crate::auth::GuardChain;
use crate::error::{Error, Result};
use crate::geo::{radius_radians, LatLng, Unit};
use crate::handlers::{
    create_one, delete_one, list_all, update_one, CollectionHandler, ItemResponse, ListResponse,
    ResourceHandlers,
};
use crate::models::{parse_timestamp, Populate, Resource, Review, Role, Tour};
use crate::query::RawQuery;
use crate::repository::{Document, DocumentStore, Filter, FilterCondition, FindQuery, ID_FIELD};
use crate::state::AppState;

/// Roles allowed to see the monthly plan
pub const PLANNERS: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];

/// Ratings at or above this count towards the stats
pub const STATS_MIN_RATING: f64 = 4.5;

/// Months reported by the monthly plan
pub const PLAN_MONTHS: usize = 12;

/// Tour router, mounted at `/api/v1/tours`
pub fn routes<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let staff = || GuardChain::protect().restrict_to(STAFF);

    Router::new()
        .route("/top-5-cheap", get(top_cheap::<S>))
        .route("/tour-stats", get(tour_stats::<S>))
        .route(
            "/monthly-plan/{year}",
            guarded(
                get(monthly_plan::<S>),
                state,
                GuardChain::protect().restrict_to(PLANNERS),
            ),
        )
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours_within::<S>),
        )
        .route("/distances/{latlng}/unit/{unit}", get(distances::<S>))
        .route(
            "/",
            get(list_all::<Tour, S>).merge(guarded(post(create_one::<Tour, S>), state, staff())),
        )
        .route(
            "/{id}",
            get(get_tour::<S>).merge(guarded(
                patch(update_one::<Tour, S>).delete(delete_one::<Tour, S>),
                state,
                staff(),
            )),
        )
        .route("/{id}/reviews", reviews::nested(state))
}

/// `GET /{id}` with the tour's reviews
pub async fn get_tour<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<ItemResponse> {
    ResourceHandlers::<Tour, S>::from_state(&state)
        .get(
            &id,
            Filter::new(),
            vec![Populate::virtual_field::<Review>("reviews", "tour")],
        )
        .await
}

/// `GET /top-5-cheap`: the five best rated, cheapest tours
pub async fn top_cheap<S: DocumentStore>(
    State(state): State<AppState<S>>,
    raw: RawQuery,
) -> Result<ListResponse> {
    let raw = raw
        .with("limit", "5")
        .with("sort", "-ratingsAverage,price")
        .with("fields", "name,price,ratingsAverage,summary,difficulty");
    ResourceHandlers::<Tour, S>::from_state(&state)
        .list(&raw, Filter::new())
        .await
}

/// Visible tours matching `filter`, unsorted and unpaginated
async fn visible_tours<S: DocumentStore>(store: &S, filter: Filter) -> Result<Vec<Document>> {
    let query = FindQuery::new()
        .with_filter(Tour::decorate())
        .with_filter(filter);
    Ok(store.find(Tour::COLLECTION, &query).await?)
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[derive(Debug, Default)]
struct DifficultyStats {
    tours: u64,
    ratings: f64,
    rating_total: f64,
    price_total: f64,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

impl DifficultyStats {
    fn add(&mut self, tour: &Document) {
        let field = |name: &str| tour.get(name).and_then(Value::as_f64).unwrap_or(0.0);
        let price = field("price");

        self.tours += 1;
        self.ratings += field("ratingsQuantity");
        self.rating_total += field("ratingsAverage");
        self.price_total += price;
        self.min_price = Some(self.min_price.map_or(price, |m| m.min(price)));
        self.max_price = Some(self.max_price.map_or(price, |m| m.max(price)));
    }

    fn avg_price(&self) -> f64 {
        self.price_total / self.tours as f64
    }

    fn into_document(self, difficulty: String) -> Document {
        let mut doc = Map::new();
        doc.insert(ID_FIELD.to_string(), Value::String(difficulty));
        doc.insert("numTours".to_string(), Value::from(self.tours));
        doc.insert("numRatings".to_string(), number(self.ratings));
        doc.insert("avgRating".to_string(), number(self.rating_total / self.tours as f64));
        doc.insert("avgPrice".to_string(), number(self.avg_price()));
        doc.insert("minPrice".to_string(), number(self.min_price.unwrap_or_default()));
        doc.insert("maxPrice".to_string(), number(self.max_price.unwrap_or_default()));
        doc
    }
}

/// Group tours by upper-cased difficulty, cheapest group first
pub fn difficulty_stats(tours: &[Document]) -> Vec<Document> {
    let mut groups: BTreeMap<String, DifficultyStats> = BTreeMap::new();
    for tour in tours {
        let difficulty = tour
            .get("difficulty")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        groups.entry(difficulty).or_default().add(tour);
    }

    let mut groups: Vec<(String, DifficultyStats)> = groups.into_iter().collect();
    groups.sort_by(|(_, a), (_, b)| {
        a.avg_price()
            .partial_cmp(&b.avg_price())
            .unwrap_or(Ordering::Equal)
    });
    groups
        .into_iter()
        .map(|(difficulty, stats)| stats.into_document(difficulty))
        .collect()
}

/// `GET /tour-stats`
pub async fn tour_stats<S: DocumentStore>(
    State(state): State<AppState<S>>,
) -> Result<ListResponse> {
    let rated = FilterCondition::gte("ratingsAverage", STATS_MIN_RATING);
    let tours = visible_tours(state.store(), rated.into()).await?;
    Ok(ListResponse::new("stats", difficulty_stats(&tours)))
}

/// Start dates are stored as RFC 3339 timestamps or plain `YYYY-MM-DD` dates
fn start_date(value: &Value) -> Option<DateTime<Utc>> {
    parse_timestamp(value).or_else(|| {
        let day = value.as_str()?.get(..10)?;
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    })
}

/// Count tour starts per month of `year`, busiest month first
pub fn monthly_plan_for(tours: &[Document], year: i32) -> Vec<Document> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        let name = tour
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let dates = tour
            .get("startDates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for date in dates.iter().filter_map(start_date) {
            if date.year() == year {
                months.entry(date.month()).or_default().push(name.clone());
            }
        }
    }

    let mut months: Vec<(u32, Vec<String>)> = months.into_iter().collect();
    // Stable sort keeps calendar order among equally busy months
    months.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()));
    months
        .into_iter()
        .take(PLAN_MONTHS)
        .map(|(month, tours)| {
            let mut doc = Map::new();
            doc.insert("month".to_string(), Value::from(month));
            doc.insert("numTourStarts".to_string(), Value::from(tours.len()));
            doc.insert(
                "tours".to_string(),
                Value::Array(tours.into_iter().map(Value::String).collect()),
            );
            doc
        })
        .collect()
}

/// `GET /monthly-plan/{year}`
pub async fn monthly_plan<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(year): Path<String>,
) -> Result<ListResponse> {
    let year: i32 = year
        .parse()
        .map_err(|_| Error::BadRequest(format!("Invalid year: {}.", year)))?;
    let tours = visible_tours(state.store(), Filter::new()).await?;
    Ok(ListResponse::new("plan", monthly_plan_for(&tours, year)))
}

fn start_location(tour: &Document) -> Option<LatLng> {
    tour.get("startLocation").and_then(LatLng::from_geojson)
}

/// `GET /tours-within/{distance}/center/{latlng}/unit/{unit}`
pub async fn tours_within<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<ListResponse> {
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| Error::BadRequest(format!("Invalid distance: {}.", distance)))?;
    let center: LatLng = latlng.parse()?;
    let unit: Unit = unit.parse()?;
    let radius = radius_radians(distance, unit);

    let tours: Vec<Document> = visible_tours(state.store(), Filter::new())
        .await?
        .into_iter()
        .filter(|tour| start_location(tour).is_some_and(|start| center.angle_to(&start) <= radius))
        .map(Tour::present)
        .collect();

    tracing::debug!(distance, %unit, results = tours.len(), "tours within radius");
    Ok(ListResponse::new("data", tours))
}

/// `GET /distances/{latlng}/unit/{unit}`: every tour's distance, nearest first
pub async fn distances<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<ListResponse> {
    let center: LatLng = latlng.parse()?;
    let unit: Unit = unit.parse()?;

    let mut measured: Vec<(f64, Document)> = visible_tours(state.store(), Filter::new())
        .await?
        .into_iter()
        .filter_map(|tour| {
            let start = start_location(&tour)?;
            let distance = center.meters_to(&start) * unit.per_meter();
            let mut doc = Map::new();
            for field in [ID_FIELD, "name"] {
                if let Some(value) = tour.get(field) {
                    doc.insert(field.to_string(), value.clone());
                }
            }
            doc.insert("distance".to_string(), number(distance));
            Some((distance, doc))
        })
        .collect();
    measured.sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    Ok(ListResponse::new(
        "data",
        measured.into_iter().map(|(_, doc)| doc).collect(),
    ))
}

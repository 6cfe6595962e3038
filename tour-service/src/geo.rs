//! Great-circle distances for tour start locations
//!
//! Points are GeoJSON `[longitude, latitude]` pairs; path parameters use the
//! `lat,lng` order people type.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Error;

const METERS_PER_RADIAN: f64 = 6_378_100.0;

/// Distance unit accepted in geo routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Statute miles
    Miles,
    /// Kilometers
    Kilometers,
}

impl Unit {
    /// Earth radius in this unit
    pub const fn earth_radius(&self) -> f64 {
        match self {
            Self::Miles => 3963.2,
            Self::Kilometers => 6378.1,
        }
    }

    /// Factor converting meters into this unit
    pub const fn per_meter(&self) -> f64 {
        match self {
            Self::Miles => 0.000_621_371,
            Self::Kilometers => 0.001,
        }
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mi" => Ok(Self::Miles),
            "km" => Ok(Self::Kilometers),
            other => Err(Error::BadRequest(format!(
                "Unknown unit: {}. Please use mi or km.",
                other
            ))),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miles => write!(f, "mi"),
            Self::Kilometers => write!(f, "km"),
        }
    }
}

/// A point on the sphere in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    /// Latitude, -90..=90
    pub lat: f64,
    /// Longitude, -180..=180
    pub lng: f64,
}

impl LatLng {
    /// Read a GeoJSON point object
    pub fn from_geojson(point: &Value) -> Option<Self> {
        let coords = point.get("coordinates")?.as_array()?;
        match coords.as_slice() {
            [lng, lat] => Some(Self {
                lat: lat.as_f64()?,
                lng: lng.as_f64()?,
            }),
            _ => None,
        }
    }

    /// Central angle to another point, in radians
    pub fn angle_to(&self, other: &LatLng) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }

    /// Distance to another point in meters
    pub fn meters_to(&self, other: &LatLng) -> f64 {
        self.angle_to(other) * METERS_PER_RADIAN
    }
}

impl FromStr for LatLng {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || {
            Error::BadRequest("Please provide latitude and longitude in the format lat,lng.".to_string())
        };
        let (lat, lng) = s.split_once(',').ok_or_else(malformed)?;
        let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
        let lng: f64 = lng.trim().parse().map_err(|_| malformed())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(malformed());
        }
        Ok(Self { lat, lng })
    }
}

/// Search radius in radians for a distance in `unit`
pub fn radius_radians(distance: f64, unit: Unit) -> f64 {
    distance / unit.earth_radius()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_latlng() {
        let center: LatLng = "34.111745,-118.113491".parse().unwrap();
        assert_eq!(center.lat, 34.111745);
        assert_eq!(center.lng, -118.113491);

        for bad in ["34.1", "abc,def", "91,0", "0,181", ""] {
            assert!(matches!(bad.parse::<LatLng>(), Err(Error::BadRequest(_))), "{}", bad);
        }
    }

    #[test]
    fn test_units() {
        assert_eq!("mi".parse::<Unit>().unwrap(), Unit::Miles);
        assert_eq!("km".parse::<Unit>().unwrap(), Unit::Kilometers);
        assert!("ft".parse::<Unit>().is_err());
        assert_eq!(radius_radians(3963.2, Unit::Miles), 1.0);
    }

    #[test]
    fn test_distance() {
        // Los Angeles to San Francisco, roughly 559 km
        let la = LatLng { lat: 34.0522, lng: -118.2437 };
        let sf = LatLng::from_geojson(&json!({ "type": "Point", "coordinates": [-122.4194, 37.7749] }))
            .unwrap();
        let km = la.meters_to(&sf) * Unit::Kilometers.per_meter();
        assert!((km - 559.0).abs() < 5.0, "{}", km);
        assert_eq!(la.angle_to(&la), 0.0);
    }

    #[test]
    fn test_from_geojson_rejects_bad_points() {
        assert!(LatLng::from_geojson(&json!({ "coordinates": [1.0] })).is_none());
        assert!(LatLng::from_geojson(&json!({ "coordinates": ["a", "b"] })).is_none());
        assert!(LatLng::from_geojson(&json!(null)).is_none());
    }
}

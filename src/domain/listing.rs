// src/domain/listing.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a listing. Opaque to the engine; only compared and hashed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the latitude/longitude ranges a map can place a marker at.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A rentable property as supplied by a listing source.
/// The discovery engine never mutates these; it only filters and displays them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub address: String,
    pub position: GeoPoint,
    /// Monthly price in whole currency units.
    pub price: u64,
    /// Category, e.g. "Studio" or "Bed Space".
    pub kind: String,
    /// Gender preference tag ("Male", "Female", "Any").
    pub gender: String,
    pub amenities: Vec<String>,
    /// Availability status ("Available", "Occupied").
    pub availability: String,
    /// Aggregate rating, already rounded to the nearest half star.
    pub rating: f32,
    pub review_count: u32,
    pub images: Vec<String>,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub created_at: Option<NaiveDateTime>,
}

impl Listing {
    /// Minimal listing with neutral attributes; callers fill in the rest with struct update syntax.
    pub fn new(id: impl Into<String>, title: impl Into<String>, position: GeoPoint, price: u64) -> Self {
        Self {
            id: ListingId::new(id),
            owner_id: String::new(),
            title: title.into(),
            description: String::new(),
            address: String::new(),
            position,
            price,
            kind: String::new(),
            gender: "Any".to_string(),
            amenities: Vec::new(),
            availability: "Available".to_string(),
            rating: 0.0,
            review_count: 0,
            images: Vec::new(),
            bedrooms: 0,
            bathrooms: 0,
            created_at: None,
        }
    }

    pub fn has_amenity(&self, amenity: &str) -> bool {
        self.amenities.iter().any(|a| a == amenity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_validity() {
        assert!(GeoPoint::new(10.6777, 124.8009).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn amenity_lookup_is_exact() {
        let listing = Listing {
            amenities: vec!["WiFi".into(), "Parking".into()],
            ..Listing::new("1", "Room", GeoPoint::new(0.0, 0.0), 3000)
        };
        assert!(listing.has_amenity("WiFi"));
        assert!(!listing.has_amenity("wifi"));
    }
}

// src/domain/filters.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PROPERTY_TYPES: &[&str] = &[
    "Studio",
    "Private Room",
    "Shared Room",
    "Bed Space",
    "Apartment",
];

pub const GENDER_PREFERENCES: &[&str] = &["Male", "Female", "Any"];

pub const AVAILABILITY_STATUSES: &[&str] = &["Available", "Occupied"];

pub const AMENITIES: &[&str] = &[
    "WiFi",
    "Air Conditioning",
    "Kitchen",
    "Parking",
    "Laundry",
    "Security",
    "Study Desk",
    "Free Water",
    "Free Electricity",
    "Television",
    "Comfort Room",
    "Smoking Allowed",
    "Pets Allowed",
];

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

impl PriceRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub const fn unbounded() -> Self {
        Self {
            min: 0,
            max: u64::MAX,
        }
    }

    pub fn contains(&self, price: u64) -> bool {
        price >= self.min && price <= self.max
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// The user's current constraints on the listing collection.
/// Replaced wholesale on every "Apply"; empty sets mean "no constraint".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    pub price_range: PriceRange,
    pub types: BTreeSet<String>,
    pub genders: BTreeSet<String>,
    /// Every listed amenity must be present on a listing.
    pub amenities: BTreeSet<String>,
    pub availability: BTreeSet<String>,
    pub min_rating: f32,
}

impl FilterOptions {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_price(mut self, min: u64, max: u64) -> Self {
        self.price_range = PriceRange::new(min, max);
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_genders<I, S>(mut self, genders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genders = genders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_amenities<I, S>(mut self, amenities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.amenities = amenities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_availability<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.availability = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_rating(mut self, rating: f32) -> Self {
        self.min_rating = rating;
        self
    }

    /// Builds filters from `application/x-www-form-urlencoded` pairs as the filter form submits them.
    ///
    /// Repeated keys (`type`, `gender`, `amenity`, `availability`) accumulate; unparsable numbers are ignored
    /// and fall back to the default bound.
    pub fn from_query(query: &str) -> Self {
        let mut filters = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "min_price" => {
                    if let Ok(n) = value.parse() {
                        filters.price_range.min = n;
                    }
                }
                "max_price" => {
                    if let Ok(n) = value.parse() {
                        filters.price_range.max = n;
                    }
                }
                "type" => {
                    filters.types.insert(value.to_string());
                }
                "gender" => {
                    filters.genders.insert(value.to_string());
                }
                "amenity" => {
                    filters.amenities.insert(value.to_string());
                }
                "availability" => {
                    filters.availability.insert(value.to_string());
                }
                "min_rating" => {
                    if let Ok(r) = value.parse::<f32>() {
                        if r.is_finite() && r >= 0.0 {
                            filters.min_rating = r;
                        }
                    }
                }
                _ => {}
            }
        }

        filters
    }
}

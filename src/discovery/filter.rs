// src/discovery/filter.rs

use crate::domain::{FilterOptions, Listing};

/// Narrows a listing collection to the listings that satisfy every active constraint.
///
/// Pure: the input is untouched and the relative order of surviving listings is kept.
pub fn apply(listings: &[Listing], filters: &FilterOptions) -> Vec<Listing> {
    listings
        .iter()
        .filter(|listing| matches(listing, filters))
        .cloned()
        .collect()
}

/// Whether a single listing passes the filters.
pub fn matches(listing: &Listing, filters: &FilterOptions) -> bool {
    if !filters.price_range.contains(listing.price) {
        return false;
    }
    if !filters.types.is_empty() && !filters.types.contains(&listing.kind) {
        return false;
    }
    if !filters.genders.is_empty() && !filters.genders.contains(&listing.gender) {
        return false;
    }
    // Required amenities are AND-ed: every one must be present.
    if !filters.amenities.iter().all(|a| listing.has_amenity(a)) {
        return false;
    }
    if !filters.availability.is_empty() && !filters.availability.contains(&listing.availability) {
        return false;
    }
    // No rating floor admits unrated and malformed ratings too.
    if filters.min_rating > 0.0 {
        listing.rating >= filters.min_rating
    } else {
        true
    }
}

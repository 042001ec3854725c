pub mod filters;
pub mod listing;
pub mod logic;

pub use filters::{FilterOptions, PriceRange};
pub use listing::{GeoPoint, Listing, ListingId};
pub use logic::{aggregate_rating, format_price, round_rating};

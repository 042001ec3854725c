pub mod error;
pub mod filters;
pub mod listing;
pub mod marker;

pub use error::load_error;
pub use filters::filter_form;
pub use listing::{detail_overlay, listing_card, listing_list, no_results, result_summary};
pub use marker::{listing_popup, price_pill};

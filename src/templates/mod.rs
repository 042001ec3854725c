pub mod components;
pub mod layouts;
pub mod pages;

// Re-exports for convenience
pub use components::{detail_overlay, listing_popup, price_pill};
pub use layouts::desktop::desktop_layout;

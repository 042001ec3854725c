use crate::domain::{format_price, Listing};
use maud::{html, Markup};

/// Price pill drawn as the marker icon.
pub fn price_pill(price: u64, currency_symbol: &str) -> Markup {
    html! {
        div class="marker-pill" {
            (format_price(price, currency_symbol))
        }
    }
}

/// Hover popup bound to a marker.
pub fn listing_popup(listing: &Listing, currency_symbol: &str) -> Markup {
    html! {
        div class="map-popup" {
            h3 class="map-popup-title" { (listing.title) }
            p class="map-popup-price" {
                (format_price(listing.price, currency_symbol)) "/month"
            }
            p class="map-popup-type" { (listing.kind) }
            @if listing.rating > 0.0 {
                p class="map-popup-rating" { "Rating: " (listing.rating) " ★" }
            }
        }
    }
}

use crate::domain::{format_price, Listing};
use maud::{html, Markup};

pub fn listing_card(listing: &Listing, currency_symbol: &str) -> Markup {
    html! {
        article
            class="card listing-card"
            id={ "listing-" (listing.id) }
            hx-get={ "/listings/" (listing.id) }
            hx-target="#overlay"
            hx-swap="innerHTML"
        {
            @if let Some(img) = listing.images.first() {
                img class="listing-thumb" src=(img) alt=(listing.title) loading="lazy";
            }
            div class="card-body" {
                h2 { (listing.title) }
                p class="listing-address" { (listing.address) }
                p class="listing-price" {
                    strong { (format_price(listing.price, currency_symbol)) } "/month"
                }
                ul class="listing-tags" {
                    li { (listing.kind) }
                    li { (listing.gender) }
                    li class={ "availability " (listing.availability.to_lowercase()) } { (listing.availability) }
                }
                @if listing.review_count > 0 {
                    p class="listing-rating" {
                        "★ " (listing.rating) " (" (listing.review_count) " reviews)"
                    }
                }
            }
        }
    }
}

/// List-mode renderer for the filtered collection.
pub fn listing_list(listings: &[Listing], currency_symbol: &str) -> Markup {
    html! {
        @if listings.is_empty() {
            (no_results())
        } @else {
            div class="listing-grid" {
                @for listing in listings {
                    (listing_card(listing, currency_symbol))
                }
            }
        }
    }
}

pub fn no_results() -> Markup {
    html! {
        div class="no-results" {
            h3 { "No properties found" }
            p { "Try widening the price range or clearing some filters." }
        }
    }
}

pub fn result_summary(shown: usize, total: usize) -> Markup {
    html! {
        p class="result-summary" id="result-summary" {
            "Showing " (shown) " of " (total) " properties"
        }
    }
}

/// Detail overlay opened when a listing is selected from the map or the list.
pub fn detail_overlay(listing: &Listing, currency_symbol: &str) -> Markup {
    html! {
        div class="overlay" role="dialog" aria-modal="true" {
            div class="overlay-panel" {
                button
                    class="overlay-close"
                    type="button"
                    hx-get="/overlay/close"
                    hx-target="#overlay"
                    hx-swap="innerHTML"
                { "×" }
                h2 { (listing.title) }
                p class="listing-address" { (listing.address) }
                p class="listing-price" {
                    strong { (format_price(listing.price, currency_symbol)) } "/month"
                }
                @if !listing.images.is_empty() {
                    div class="overlay-gallery" {
                        @for img in &listing.images {
                            img src=(img) alt=(listing.title) loading="lazy";
                        }
                    }
                }
                p { (listing.description) }
                dl class="overlay-facts" {
                    dt { "Type" } dd { (listing.kind) }
                    dt { "Preferred tenant" } dd { (listing.gender) }
                    dt { "Availability" } dd { (listing.availability) }
                    dt { "Bedrooms" } dd { (listing.bedrooms) }
                    dt { "Bathrooms" } dd { (listing.bathrooms) }
                    dt { "Rating" }
                    dd {
                        @if listing.review_count > 0 {
                            (listing.rating) " ★ (" (listing.review_count) " reviews)"
                        } @else {
                            "No reviews yet"
                        }
                    }
                }
                @if !listing.amenities.is_empty() {
                    h3 { "Amenities" }
                    ul class="overlay-amenities" {
                        @for a in &listing.amenities {
                            li { (a) }
                        }
                    }
                }
            }
        }
    }
}

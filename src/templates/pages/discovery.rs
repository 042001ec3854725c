// templates/pages/discovery.rs

use crate::domain::{FilterOptions, Listing};
use crate::templates::{
    components::{filter_form, listing_list, load_error, result_summary},
    desktop_layout,
};
use maud::{html, Markup};

/// What the result area shows: either the filtered collection or a load failure.
pub enum Results<'a> {
    Loaded {
        shown: &'a [Listing],
        total: usize,
    },
    Failed {
        message: &'a str,
        retry_url: &'a str,
    },
}

pub struct DiscoveryVm<'a> {
    pub filters: &'a FilterOptions,
    pub results: Results<'a>,
    pub currency_symbol: &'a str,
    pub price_ceiling: u64,
}

pub fn discovery_page(vm: &DiscoveryVm<'_>) -> Markup {
    desktop_layout(
        "Find a place",
        html! {
            main class="container discovery" {
                aside class="discovery-filters" {
                    (filter_form(vm.filters, vm.price_ceiling))
                }
                section id="results" class="discovery-results" {
                    (results_fragment(vm))
                }
            }
        },
    )
}

/// The part of the page that `/listings` swaps in after "Apply" or "Reset".
pub fn results_fragment(vm: &DiscoveryVm<'_>) -> Markup {
    match &vm.results {
        Results::Loaded { shown, total } => html! {
            (result_summary(shown.len(), *total))
            (listing_list(shown, vm.currency_symbol))
        },
        Results::Failed { message, retry_url } => load_error(message, retry_url),
    }
}

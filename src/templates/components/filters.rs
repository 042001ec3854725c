use crate::domain::filters::{AMENITIES, AVAILABILITY_STATUSES, GENDER_PREFERENCES, PROPERTY_TYPES};
use crate::domain::FilterOptions;
use maud::{html, Markup};
use std::collections::BTreeSet;

/// Filter panel. "Apply" swaps the result area via htmx; "Reset" submits no filters at all.
pub fn filter_form(filters: &FilterOptions, price_ceiling: u64) -> Markup {
    let max_price = filters.price_range.max.min(price_ceiling);

    html! {
        form
            class="card filter-form"
            id="filters"
            hx-get="/listings"
            hx-target="#results"
            hx-swap="innerHTML"
        {
            h3 { "Filters" }

            fieldset {
                legend { "Price range" }
                label {
                    "Min"
                    input type="number" name="min_price" min="0" max=(price_ceiling)
                        value=(filters.price_range.min);
                }
                label {
                    "Max"
                    input type="number" name="max_price" min="0" max=(price_ceiling)
                        value=(max_price);
                }
            }

            (checkbox_group("Property type", "type", PROPERTY_TYPES, &filters.types))
            (checkbox_group("Gender preference", "gender", GENDER_PREFERENCES, &filters.genders))
            (checkbox_group("Availability", "availability", AVAILABILITY_STATUSES, &filters.availability))
            (checkbox_group("Amenities", "amenity", AMENITIES, &filters.amenities))

            fieldset {
                legend { "Minimum rating" }
                select name="min_rating" {
                    @for r in [0u8, 1, 2, 3, 4, 5] {
                        option value=(r) selected[filters.min_rating == f32::from(r)] {
                            @if r == 0 { "Any" } @else { (r) "+ ★" }
                        }
                    }
                }
            }

            div class="filter-actions" {
                button type="submit" class="btn" { "Apply" }
                button
                    type="button"
                    class="btn btn-secondary"
                    hx-get="/listings"
                    hx-target="#results"
                    hx-swap="innerHTML"
                { "Reset" }
            }
        }
    }
}

fn checkbox_group(legend: &str, name: &str, options: &[&str], selected: &BTreeSet<String>) -> Markup {
    html! {
        fieldset {
            legend { (legend) }
            @for opt in options {
                label class="checkbox" {
                    input type="checkbox" name=(name) value=(opt) checked[selected.contains(*opt)];
                    " " (opt)
                }
            }
        }
    }
}

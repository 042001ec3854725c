use maud::{html, Markup};

/// Inline load failure with a retry affordance that re-requests `retry_url` into the same target.
pub fn load_error(message: &str, retry_url: &str) -> Markup {
    html! {
        div class="card load-error" role="alert" {
            h3 { "Couldn't load properties" }
            p { (message) }
            button
                class="btn"
                type="button"
                hx-get=(retry_url)
                hx-target="#results"
                hx-swap="innerHTML"
            { "Retry" }
        }
    }
}

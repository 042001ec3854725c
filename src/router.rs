use crate::config::DiscoveryConfig;
use crate::discovery::filter;
use crate::domain::{FilterOptions, ListingId};
use crate::errors::ServerError;
use crate::responses::{html_response, html_with_status, ResultResp};
use crate::source::ListingSource;
use crate::templates::pages::{discovery_page, results_fragment, DiscoveryVm, Results};
use crate::templates::detail_overlay;
use astra::Request;
use maud::html;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

/// Everything a request handler needs. Built once in `main` and shared by all workers.
pub struct AppContext {
    pub source: Box<dyn ListingSource + Send + Sync>,
    pub config: DiscoveryConfig,
}

impl AppContext {
    pub fn new(source: Box<dyn ListingSource + Send + Sync>, config: DiscoveryConfig) -> Self {
        Self { source, config }
    }
}

pub fn handle(req: Request, ctx: &AppContext) -> ResultResp {
    let method = req.method().as_str();
    let path = req.uri().path();
    let query = req.uri().query().unwrap_or("");
    debug!(%method, %path, "request");

    match (method, path) {
        ("GET", "/") => discovery(ctx, query, false),
        ("GET", "/listings") => discovery(ctx, query, true),
        ("GET", "/overlay/close") => html_response(html! {}),
        ("GET", p) if p.starts_with("/listings/") => {
            let id = &p["/listings/".len()..];
            listing_detail(ctx, id)
        }
        _ => Err(ServerError::NotFound),
    }
}

/// Full page, or just the result area for htmx. A failed fetch renders an error with a retry button
/// instead of failing the request.
fn discovery(ctx: &AppContext, query: &str, fragment: bool) -> ResultResp {
    let filters = FilterOptions::from_query(query);
    let retry_url = if query.is_empty() {
        "/listings".to_string()
    } else {
        format!("/listings?{query}")
    };

    let fetched = ctx.source.fetch_listings();
    let filtered;
    let message;
    let (results, status) = match &fetched {
        Ok(all) => {
            filtered = filter::apply(all, &filters);
            (
                Results::Loaded {
                    shown: &filtered,
                    total: all.len(),
                },
                200,
            )
        }
        Err(e) => {
            warn!(error = %e, "failed to load listings");
            message = e.to_string();
            (
                Results::Failed {
                    message: &message,
                    retry_url: &retry_url,
                },
                // htmx only swaps successful responses.
                if fragment { 200 } else { 503 },
            )
        }
    };

    let vm = DiscoveryVm {
        filters: &filters,
        results,
        currency_symbol: &ctx.config.currency_symbol,
        price_ceiling: ctx.config.price_ceiling,
    };

    if fragment {
        html_with_status(status, results_fragment(&vm))
    } else {
        html_with_status(status, discovery_page(&vm))
    }
}

fn listing_detail(ctx: &AppContext, raw_id: &str) -> ResultResp {
    if raw_id.is_empty() || raw_id.contains('/') {
        return Err(ServerError::NotFound);
    }
    let decoded: String = percent_decode_str(raw_id).decode_utf8_lossy().into_owned();
    let id = ListingId::from(decoded.as_str());

    let listing = ctx
        .source
        .fetch_listing(&id)
        .map_err(|e| ServerError::SourceUnavailable(e.to_string()))?
        .ok_or(ServerError::NotFound)?;

    html_response(detail_overlay(&listing, &ctx.config.currency_symbol))
}

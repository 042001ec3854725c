// backend.rs
use crate::config::BackendConfig;
use crate::domain::{GeoPoint, Listing, ListingId};
use crate::source::{ListingSource, SourceError};
use chrono::{DateTime, NaiveDateTime};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const MAX_BACKOFF_MS: u64 = 4_000;
const JITTER_MAX_MS: u64 = 250;

/// Blocking client for the hosted REST backend's `properties` table.
///
/// Constructed explicitly from a [`BackendConfig`] and handed to whoever needs it; there is no global client.
pub struct BackendClient {
    client: Client,
    base_url: Url,
    max_attempts: u32,
}

/// Row shape returned by `GET /rest/v1/properties`.
#[derive(Debug, Deserialize)]
pub struct ListingRow {
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    pub location: Option<RowLocation>,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub reviews: Option<u32>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RowLocation {
    pub lat: f64,
    pub lng: f64,
}

impl ListingRow {
    /// `None` for rows without a usable location; those cannot be placed on the map or listed.
    pub fn into_listing(self) -> Option<Listing> {
        let Some(loc) = self.location else {
            warn!(listing_id = %self.id, "backend row has no location, skipping");
            return None;
        };

        Some(Listing {
            id: ListingId(self.id),
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            address: self.address,
            position: GeoPoint::new(loc.lat, loc.lng),
            price: if self.price.is_finite() && self.price > 0.0 {
                self.price.round() as u64
            } else {
                0
            },
            kind: self.kind,
            gender: self.gender.unwrap_or_else(|| "Any".into()),
            availability: self.availability.unwrap_or_else(|| "Available".into()),
            amenities: self.amenities.unwrap_or_default(),
            rating: self
                .rating
                .map(crate::domain::round_rating)
                .unwrap_or(0.0),
            review_count: self.reviews.unwrap_or(0),
            images: self.images.unwrap_or_default(),
            bedrooms: self.bedrooms.unwrap_or(0),
            bathrooms: self.bathrooms.unwrap_or(0),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Decodes a JSON array of rows, dropping rows that cannot become listings.
pub fn decode_rows(body: &str) -> Result<Vec<Listing>, SourceError> {
    let rows: Vec<ListingRow> =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(rows.into_iter().filter_map(ListingRow::into_listing).collect())
}

/// Which rows of the `properties` table a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter<'a> {
    All,
    Owner(&'a str),
    Id(&'a str),
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| SourceError::Network(format!("invalid api key header: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| SourceError::Network(format!("invalid api key header: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// `{base}/rest/v1/properties?select=*&order=created_at.desc`, narrowed by `rows`.
    pub fn properties_url(&self, rows: RowFilter<'_>) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join("rest/v1/properties")
            .map_err(|e| SourceError::Network(e.to_string()))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("select", "*");
            q.append_pair("order", "created_at.desc");
            match rows {
                RowFilter::All => {}
                RowFilter::Owner(owner) => {
                    q.append_pair("owner_id", &format!("eq.{owner}"));
                }
                RowFilter::Id(id) => {
                    q.append_pair("id", &format!("eq.{id}"));
                    q.append_pair("limit", "1");
                }
            }
        }
        Ok(url)
    }

    fn fetch(&self, rows: RowFilter<'_>) -> Result<Vec<Listing>, SourceError> {
        let url = self.properties_url(rows)?;
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            match self.try_fetch(&url) {
                Ok(listings) => {
                    debug!(attempt, count = listings.len(), "fetched listings from backend");
                    return Ok(listings);
                }
                // Client errors will not get better by retrying.
                Err(e @ SourceError::Status { status: 400..=499, .. }) => return Err(e),
                Err(e) => {
                    warn!(attempt, max = self.max_attempts, error = %e, "backend fetch failed");
                    last_err = Some(e);
                    if attempt < self.max_attempts {
                        let base = (250 * 2u64.pow(attempt)).min(MAX_BACKOFF_MS);
                        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
                        std::thread::sleep(Duration::from_millis(base + jitter));
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| SourceError::Network("backend retry loop failed".into())))
    }

    fn try_fetch(&self, url: &Url) -> Result<Vec<Listing>, SourceError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        decode_rows(&text)
    }
}

impl ListingSource for BackendClient {
    fn fetch_listings(&self) -> Result<Vec<Listing>, SourceError> {
        self.fetch(RowFilter::All)
    }

    fn fetch_owner_listings(&self, owner_id: &str) -> Result<Vec<Listing>, SourceError> {
        self.fetch(RowFilter::Owner(owner_id))
    }

    fn fetch_listing(&self, id: &ListingId) -> Result<Option<Listing>, SourceError> {
        Ok(self.fetch(RowFilter::Id(id.as_str()))?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: &str = r#"[
        {
            "id": "p-1",
            "owner_id": "o-1",
            "title": "Sample Property",
            "description": "A cozy place",
            "price": 5000,
            "address": "Ormoc",
            "location": { "lat": 10.6777, "lng": 124.8009 },
            "amenities": ["WiFi", "Kitchen"],
            "type": "Studio",
            "availability": "Available",
            "gender": "Any",
            "rating": 4.3,
            "reviews": 7,
            "images": null,
            "bedrooms": 1,
            "bathrooms": 1,
            "owner_name": "Owner",
            "created_at": "2024-01-10T08:00:00.000+00:00"
        },
        { "id": "p-2", "title": "No location", "location": null, "price": 100 }
    ]"#;

    #[test]
    fn decodes_rows_and_skips_unplaceable_ones() {
        let listings = decode_rows(ROWS).unwrap();
        assert_eq!(listings.len(), 1);

        let l = &listings[0];
        assert_eq!(l.id.as_str(), "p-1");
        assert_eq!(l.kind, "Studio");
        assert_eq!(l.price, 5000);
        assert_eq!(l.rating, 4.5);
        assert_eq!(l.review_count, 7);
        assert!(l.images.is_empty());
        assert!(l.created_at.is_some());
    }

    #[test]
    fn rejects_non_array_body() {
        assert!(matches!(decode_rows(r#"{"message":"nope"}"#), Err(SourceError::Decode(_))));
    }

    #[test]
    fn builds_scoped_urls() {
        let cfg = BackendConfig::new(Url::parse("https://example.supabase.co/").unwrap(), "key");
        let client = BackendClient::new(&cfg).unwrap();

        let all = client.properties_url(RowFilter::All).unwrap();
        assert_eq!(all.path(), "/rest/v1/properties");
        assert_eq!(all.query(), Some("select=*&order=created_at.desc"));

        let mine = client.properties_url(RowFilter::Owner("o-1")).unwrap();
        assert!(mine.query().unwrap().ends_with("owner_id=eq.o-1"));

        let one = client.properties_url(RowFilter::Id("p 1")).unwrap();
        assert!(one.query().unwrap().ends_with("id=eq.p+1&limit=1"));
    }
}

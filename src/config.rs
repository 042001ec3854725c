// src/config.rs

use crate::domain::GeoPoint;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Raster tile template plus the attribution the tile provider requires.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileSource {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            max_zoom: 19,
        }
    }
}

/// Tunables for the discovery engine. Durations are behaviour knobs, not contracts.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// DOM id of the element the map instance binds to.
    pub container_id: String,
    pub tiles: TileSource,
    pub default_center: GeoPoint,
    pub default_zoom: f64,
    /// Zoom used when recentering on the user's location.
    pub locate_zoom: f64,
    /// Fraction of the fitted bounds added on every side.
    pub bounds_padding: f64,
    /// Quiet period before a hovered popup closes after the pointer leaves its marker.
    pub popup_close_delay: Duration,
    /// Quiet period that coalesces bounds fits after marker synchronization.
    pub fit_bounds_debounce: Duration,
    /// How often to check whether the map library has finished loading.
    pub library_poll_interval: Duration,
    /// Delay before asking a freshly created map to re-measure its container.
    pub invalidate_size_delay: Duration,
    /// Periodic listing re-fetch; `None` disables it.
    pub refresh_interval: Option<Duration>,
    pub currency_symbol: String,
    /// Upper end of the price slider in the filter form.
    pub price_ceiling: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            container_id: "map".to_string(),
            tiles: TileSource::default(),
            default_center: GeoPoint::new(10.6777, 124.8009),
            default_zoom: 14.0,
            locate_zoom: 16.0,
            bounds_padding: 0.1,
            popup_close_delay: Duration::from_millis(200),
            fit_bounds_debounce: Duration::from_millis(250),
            library_poll_interval: Duration::from_millis(100),
            invalidate_size_delay: Duration::from_millis(100),
            refresh_interval: None,
            currency_symbol: "₱".to_string(),
            price_ceiling: 10_000,
        }
    }
}

/// Settings for the list-mode web host.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: String,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            db_path: "boardmap.sqlite3".to_string(),
            workers: 8,
        }
    }
}

impl ServerConfig {
    /// Reads `BOARDMAP_ADDR`, `BOARDMAP_DB` and `BOARDMAP_WORKERS`, keeping defaults for anything unset
    /// or unparsable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(addr) = env::var("BOARDMAP_ADDR") {
            match addr.parse() {
                Ok(a) => cfg.addr = a,
                Err(e) => tracing::warn!(%addr, error = %e, "ignoring invalid BOARDMAP_ADDR"),
            }
        }
        if let Ok(path) = env::var("BOARDMAP_DB") {
            if !path.trim().is_empty() {
                cfg.db_path = path;
            }
        }
        if let Some(n) = env::var("BOARDMAP_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            cfg.workers = n;
        }

        cfg
    }
}

/// Connection details for the hosted REST backend that owns listing data.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub api_key: String,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl BackendConfig {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            timeout: Duration::from_secs(15),
            max_attempts: 3,
        }
    }

    /// `Some` only when both `BOARDMAP_BACKEND_URL` and `BOARDMAP_BACKEND_KEY` are set and the url parses.
    pub fn from_env() -> Option<Self> {
        let raw_url = env::var("BOARDMAP_BACKEND_URL").ok()?;
        let key = env::var("BOARDMAP_BACKEND_KEY").ok()?;

        match Url::parse(&raw_url) {
            Ok(url) => Some(Self::new(url, key)),
            Err(e) => {
                tracing::warn!(url = %raw_url, error = %e, "ignoring invalid BOARDMAP_BACKEND_URL");
                None
            }
        }
    }
}

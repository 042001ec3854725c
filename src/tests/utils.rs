use crate::db::connection::{init_db, seed_demo, Database};
use crate::discovery::{DiscoveryHost, LoadState, Notice, ResultSummary};
use crate::domain::{GeoPoint, Listing};
use crate::source::{ListingSource, SourceError};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fresh database file under the temp dir, unique per call.
pub fn temp_db(name: &str) -> Database {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "boardmap_{name}_{}_{nanos}_{n}.sqlite",
        std::process::id()
    ));
    Database::new(path.to_string_lossy().into_owned())
}

/// Initialized and seeded database.
pub fn seeded_db(name: &str) -> Database {
    let db = temp_db(name);
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    seed_demo(&db).unwrap_or_else(|e| panic!("Seeding failed: {e}"));
    db
}

pub fn listing(id: &str, lat: f64, lng: f64, price: u64) -> Listing {
    Listing::new(id, format!("Listing {id}"), GeoPoint::new(lat, lng), price)
}

#[derive(Default)]
struct FakeState {
    listings: Vec<Listing>,
    fail_with: Option<String>,
    fetches: usize,
}

/// In-memory listing source the test can reconfigure after handing it to the engine.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Rc<RefCell<FakeState>>,
}

impl FakeSource {
    pub fn with(listings: Vec<Listing>) -> Self {
        let source = Self::default();
        source.set_listings(listings);
        source
    }

    pub fn set_listings(&self, listings: Vec<Listing>) {
        self.state.borrow_mut().listings = listings;
    }

    pub fn fail(&self, message: &str) {
        self.state.borrow_mut().fail_with = Some(message.to_string());
    }

    pub fn recover(&self) {
        self.state.borrow_mut().fail_with = None;
    }

    pub fn fetches(&self) -> usize {
        self.state.borrow().fetches
    }
}

impl ListingSource for FakeSource {
    fn fetch_listings(&self) -> Result<Vec<Listing>, SourceError> {
        let mut s = self.state.borrow_mut();
        s.fetches += 1;
        match &s.fail_with {
            Some(msg) => Err(SourceError::Network(msg.clone())),
            None => Ok(s.listings.clone()),
        }
    }

    fn fetch_owner_listings(&self, owner_id: &str) -> Result<Vec<Listing>, SourceError> {
        Ok(self
            .fetch_listings()?
            .into_iter()
            .filter(|l| l.owner_id == owner_id)
            .collect())
    }
}

/// Host that records every callback.
#[derive(Default)]
pub struct RecordingHost {
    pub selected: Vec<String>,
    pub summaries: Vec<ResultSummary>,
    pub load_states: Vec<LoadState>,
    pub notices: Vec<Notice>,
    pub geolocation: bool,
    pub location_requests: usize,
}

impl RecordingHost {
    pub fn with_geolocation() -> Self {
        Self {
            geolocation: true,
            ..Self::default()
        }
    }
}

impl DiscoveryHost for RecordingHost {
    fn listing_selected(&mut self, listing: &Listing) {
        self.selected.push(listing.id.to_string());
    }

    fn results_changed(&mut self, summary: ResultSummary) {
        self.summaries.push(summary);
    }

    fn load_state_changed(&mut self, state: &LoadState) {
        self.load_states.push(state.clone());
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn request_location(&mut self) -> bool {
        self.location_requests += 1;
        self.geolocation
    }
}

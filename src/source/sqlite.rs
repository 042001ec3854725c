use crate::db::connection::Database;
use crate::db::listings;
use crate::domain::{Listing, ListingId};
use crate::source::{ListingSource, SourceError};

/// Listings stored in the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    db: Database,
}

impl SqliteSource {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl ListingSource for SqliteSource {
    fn fetch_listings(&self) -> Result<Vec<Listing>, SourceError> {
        listings::fetch_listings(&self.db).map_err(|e| SourceError::Storage(e.to_string()))
    }

    fn fetch_owner_listings(&self, owner_id: &str) -> Result<Vec<Listing>, SourceError> {
        listings::fetch_owner_listings(&self.db, owner_id)
            .map_err(|e| SourceError::Storage(e.to_string()))
    }

    fn fetch_listing(&self, id: &ListingId) -> Result<Option<Listing>, SourceError> {
        listings::fetch_listing(&self.db, id).map_err(|e| SourceError::Storage(e.to_string()))
    }
}

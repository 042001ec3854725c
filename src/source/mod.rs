//! Listing collaborators: where the discovery engine gets its raw collection from.

pub mod backend;
pub mod sqlite;

use crate::domain::{Listing, ListingId};
use thiserror::Error;

pub use backend::BackendClient;
pub use sqlite::SqliteSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode listings: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Supplies listing collections. Implementations must be cheap to call repeatedly: the engine re-fetches on
/// retry and on periodic refresh.
pub trait ListingSource {
    fn fetch_listings(&self) -> Result<Vec<Listing>, SourceError>;

    fn fetch_owner_listings(&self, owner_id: &str) -> Result<Vec<Listing>, SourceError>;

    /// One listing by id. The default scans the whole collection.
    fn fetch_listing(&self, id: &ListingId) -> Result<Option<Listing>, SourceError> {
        Ok(self.fetch_listings()?.into_iter().find(|l| &l.id == id))
    }
}

impl<S: ListingSource + ?Sized> ListingSource for Box<S> {
    fn fetch_listings(&self) -> Result<Vec<Listing>, SourceError> {
        (**self).fetch_listings()
    }

    fn fetch_owner_listings(&self, owner_id: &str) -> Result<Vec<Listing>, SourceError> {
        (**self).fetch_owner_listings(owner_id)
    }

    fn fetch_listing(&self, id: &ListingId) -> Result<Option<Listing>, SourceError> {
        (**self).fetch_listing(id)
    }
}

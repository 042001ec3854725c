// errors.rs
use thiserror::Error;

/// Errors originating from either the server logic
/// (routing, missing resources, etc.) or downstream layers (DB, listing backend).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not Found")]
    NotFound,
    #[error("Database Error: {0}")]
    DbError(String),
    #[error("Listings unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Internal Server Error")]
    InternalError,
}

use rusqlite::Connection;
use std::cell::RefCell;
use tracing::{debug, info};

use crate::errors::ServerError;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const SEED_SQL: &str = include_str!("../../sql/seed.sql");

// Thread-local connection slot, tagged with the path it was opened for.
thread_local! {
    static DB_CONN: RefCell<Option<(String, Connection)>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Provides a mutable connection to the closure.
    /// Each worker thread keeps one connection and reopens it if a different database is asked for.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ServerError>,
    {
        DB_CONN
            .try_with(|cell| {
                let mut slot = cell.borrow_mut();
                let stale = !matches!(slot.as_ref(), Some((path, _)) if *path == self.path);
                if stale {
                    debug!(path = %self.path, "opening sqlite connection");
                    let conn = Connection::open(&self.path)
                        .map_err(|e| ServerError::DbError(format!("Open DB failed: {e}")))?;
                    conn.execute_batch("PRAGMA foreign_keys = ON;")
                        .map_err(|e| ServerError::DbError(e.to_string()))?;
                    *slot = Some((self.path.clone(), conn));
                }
                match slot.as_mut() {
                    Some((_, conn)) => f(conn),
                    None => Err(ServerError::InternalError),
                }
            })
            .map_err(|_| ServerError::InternalError)?
    }
}

/// Creates the listing and review tables if they do not exist.
pub fn init_db(db: &Database) -> Result<(), ServerError> {
    db.with_conn(|conn| {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| ServerError::DbError(format!("Failed to apply schema: {e}")))
    })?;
    info!(path = %db.path(), "database initialized");
    Ok(())
}

/// Inserts the demo listings. Safe to run repeatedly.
pub fn seed_demo(db: &Database) -> Result<(), ServerError> {
    db.with_conn(|conn| {
        conn.execute_batch(SEED_SQL)
            .map_err(|e| ServerError::DbError(format!("Failed to seed database: {e}")))
    })?;
    info!(path = %db.path(), "demo listings seeded");
    Ok(())
}

use crate::db::connection::Database;
use crate::domain::{aggregate_rating, GeoPoint, Listing, ListingId};
use crate::errors::ServerError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::warn;

const LISTING_COLUMNS: &str = "id, owner_id, title, description, address, lat, lng, price, kind, gender, \
     availability, amenities, images, bedrooms, bathrooms, created_at";

/// Every listing, newest first.
pub fn fetch_listings(db: &Database) -> Result<Vec<Listing>, ServerError> {
    db.with_conn(|conn| {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings ORDER BY created_at DESC, id");
        let listings = query_listings(conn, &sql, [])?;
        with_ratings(conn, listings)
    })
}

/// One owner's listings, newest first.
pub fn fetch_owner_listings(db: &Database, owner_id: &str) -> Result<Vec<Listing>, ServerError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE owner_id = ?1 ORDER BY created_at DESC, id"
        );
        let listings = query_listings(conn, &sql, params![owner_id])?;
        with_ratings(conn, listings)
    })
}

pub fn fetch_listing(db: &Database, id: &ListingId) -> Result<Option<Listing>, ServerError> {
    db.with_conn(|conn| {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1");
        let listing = conn
            .query_row(&sql, params![id.as_str()], map_listing)
            .optional()
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        match listing {
            Some(l) => Ok(with_ratings(conn, vec![l])?.pop()),
            None => Ok(None),
        }
    })
}

fn query_listings<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Listing>, ServerError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ServerError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map(params, map_listing)
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
    }
    Ok(out)
}

fn map_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let id: String = row.get(0)?;
    let amenities: String = row.get(11)?;
    let images: String = row.get(12)?;
    let price: i64 = row.get(7)?;
    let created_at: Option<NaiveDateTime> = row.get(15).ok();

    Ok(Listing {
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        address: row.get(4)?,
        position: GeoPoint::new(row.get(5)?, row.get(6)?),
        price: u64::try_from(price).unwrap_or(0),
        kind: row.get(8)?,
        gender: row.get(9)?,
        availability: row.get(10)?,
        amenities: json_list(&id, "amenities", &amenities),
        images: json_list(&id, "images", &images),
        rating: 0.0,
        review_count: 0,
        bedrooms: row.get(13)?,
        bathrooms: row.get(14)?,
        created_at,
        id: ListingId(id),
    })
}

fn json_list(id: &str, column: &str, raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(listing_id = %id, column, error = %e, "malformed JSON list column, treating as empty");
        Vec::new()
    })
}

/// Fills in `rating` and `review_count` from the reviews table.
fn with_ratings(conn: &Connection, mut listings: Vec<Listing>) -> Result<Vec<Listing>, ServerError> {
    if listings.is_empty() {
        return Ok(listings);
    }

    let mut stmt = conn
        .prepare("SELECT listing_id, rating FROM reviews")
        .map_err(|e| ServerError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u8>(1)?)))
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut scores: HashMap<String, Vec<u8>> = HashMap::new();
    for r in rows {
        let (listing_id, rating) = r.map_err(|e| ServerError::DbError(e.to_string()))?;
        scores.entry(listing_id).or_default().push(rating);
    }

    for listing in &mut listings {
        if let Some(s) = scores.get(listing.id.as_str()) {
            let (rating, count) = aggregate_rating(s);
            listing.rating = rating;
            listing.review_count = count;
        }
    }
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::{init_db, seed_demo};
    use crate::tests::utils::temp_db;

    #[test]
    fn seeded_listings_carry_aggregated_ratings() {
        let db = temp_db("listings_ratings");
        init_db(&db).unwrap();
        seed_demo(&db).unwrap();

        let all = fetch_listings(&db).unwrap();
        assert_eq!(all.len(), 4);
        // Newest first.
        assert_eq!(all[0].id.as_str(), "seed-4");

        let seed1 = all.iter().find(|l| l.id.as_str() == "seed-1").unwrap();
        assert_eq!(seed1.review_count, 2);
        assert_eq!(seed1.rating, 4.5);
        assert!(seed1.has_amenity("WiFi"));

        let seed4 = all.iter().find(|l| l.id.as_str() == "seed-4").unwrap();
        assert_eq!(seed4.review_count, 0);
        assert_eq!(seed4.rating, 0.0);
    }

    #[test]
    fn owner_scope_and_single_fetch() {
        let db = temp_db("listings_owner");
        init_db(&db).unwrap();
        seed_demo(&db).unwrap();

        let mine = fetch_owner_listings(&db, "owner-2").unwrap();
        let ids: Vec<_> = mine.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["seed-4", "seed-3"]);

        assert!(fetch_listing(&db, &"nope".into()).unwrap().is_none());
        let one = fetch_listing(&db, &"seed-2".into()).unwrap().unwrap();
        assert_eq!(one.price, 8000);
        assert_eq!(one.rating, 5.0);
    }
}

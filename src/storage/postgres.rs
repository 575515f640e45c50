use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::crawler::models::CarListing;
use crate::storage::Storage;

// The unique constraint on `url` is the authoritative dedup guard; the
// pre-insert lookup only makes the skip observable to the caller.
const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cars (
    id            BIGSERIAL PRIMARY KEY,
    url           TEXT NOT NULL UNIQUE,
    title         TEXT,
    price_usd     INTEGER,
    odometer_km   INTEGER NOT NULL DEFAULT 0,
    seller_name   TEXT,
    phone_number  TEXT,
    image_url     TEXT,
    plate_number  TEXT,
    vin           TEXT,
    city          TEXT,
    owners_count  INTEGER NOT NULL DEFAULT 0,
    engine_info   TEXT,
    found_at      TIMESTAMPTZ NOT NULL
)
"#;

const INSERT_CAR: &str = r#"
INSERT INTO cars (
    url, title, price_usd, odometer_km, seller_name, phone_number,
    image_url, plate_number, vin, city, owners_count, engine_info, found_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
ON CONFLICT (url) DO NOTHING
"#;

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connects to the store and ensures the schema exists. A failure here
    /// is the only error that terminates the whole process.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn save(&self, listing: &CarListing) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM cars WHERE url = $1")
            .bind(&listing.url)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            tx.commit().await?;
            return Ok(false);
        }

        let result = sqlx::query(INSERT_CAR)
            .bind(&listing.url)
            .bind(&listing.title)
            .bind(listing.price_usd)
            .bind(listing.odometer_km)
            .bind(&listing.seller_name)
            .bind(&listing.phone_number)
            .bind(&listing.image_url)
            .bind(&listing.plate_number)
            .bind(&listing.vin)
            .bind(&listing.city)
            .bind(listing.owners_count)
            .bind(&listing.engine_info)
            .bind(listing.found_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

use super::{DriverStore, StoreError};
use crate::models::{Claim, Driver, DriverUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Postgres-backed driver store
pub struct PostgresDriverStore {
    pool: PgPool,
}

impl PostgresDriverStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DriverRow {
    id: String,
    name: String,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DriverRow> for Driver {
    fn from(row: DriverRow) -> Self {
        Driver {
            id: row.id,
            name: row.name,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_DRIVER: &str = r#"
    SELECT id, name, available, created_at, updated_at
    FROM drivers
"#;

#[async_trait]
impl DriverStore for PostgresDriverStore {
    async fn create(&self, driver: Driver) -> Result<Driver, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO drivers (id, name, available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&driver.id)
        .bind(&driver.name)
        .bind(driver.available)
        .bind(driver.created_at)
        .bind(driver.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Validation(format!(
                "driver {} already exists",
                driver.id
            )));
        }

        Ok(driver)
    }

    async fn get(&self, id: &str) -> Result<Option<Driver>, StoreError> {
        let row: Option<DriverRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_DRIVER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Driver::from))
    }

    async fn list(&self) -> Result<Vec<Driver>, StoreError> {
        let rows: Vec<DriverRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at, id", SELECT_DRIVER))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Driver::from).collect())
    }

    async fn update(&self, id: &str, update: DriverUpdate) -> Result<Driver, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<DriverRow> =
            sqlx::query_as(&format!("{} WHERE id = $1 FOR UPDATE", SELECT_DRIVER))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let mut driver = match row {
            Some(row) => Driver::from(row),
            None => return Err(StoreError::NotFound(id.to_string())),
        };

        update.apply(&mut driver);

        sqlx::query("UPDATE drivers SET available = $2, updated_at = $3 WHERE id = $1")
            .bind(&driver.id)
            .bind(driver.available)
            .bind(driver.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(driver)
    }

    async fn claim_for_trip(&self, trip_id: &str) -> Result<Claim, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT driver_id FROM driver_assignments WHERE trip_id = $1")
                .bind(trip_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some((driver_id,)) = existing {
            return Ok(Claim::AlreadyAssigned(driver_id));
        }

        // Concurrent claimers skip rows another transaction holds
        let row: Option<DriverRow> = sqlx::query_as(&format!(
            "{} WHERE available ORDER BY created_at, id LIMIT 1 FOR UPDATE SKIP LOCKED",
            SELECT_DRIVER
        ))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(Claim::NoneAvailable);
        };
        let mut driver = Driver::from(row);
        DriverUpdate::SetAvailable(false).apply(&mut driver);

        sqlx::query("UPDATE drivers SET available = FALSE, updated_at = $2 WHERE id = $1")
            .bind(&driver.id)
            .bind(driver.updated_at)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO driver_assignments (trip_id, driver_id, assigned_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (trip_id) DO NOTHING
            "#,
        )
        .bind(trip_id)
        .bind(&driver.id)
        .bind(driver.updated_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Another claim for this trip committed first
            tx.rollback().await?;
            let winner: (String,) =
                sqlx::query_as("SELECT driver_id FROM driver_assignments WHERE trip_id = $1")
                    .bind(trip_id)
                    .fetch_one(&self.pool)
                    .await?;
            return Ok(Claim::AlreadyAssigned(winner.0));
        }

        tx.commit().await?;
        Ok(Claim::Assigned(driver))
    }

    async fn assignment(&self, trip_id: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT driver_id FROM driver_assignments WHERE trip_id = $1")
                .bind(trip_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(driver_id,)| driver_id))
    }
}

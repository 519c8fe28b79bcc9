use super::{StoreError, TripStore};
use crate::models::{Trip, TripStatus, TripUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_consumer::LatLng;
use sqlx::PgPool;

/// Postgres-backed trip store
pub struct PostgresTripStore {
    pool: PgPool,
}

impl PostgresTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: String,
    rider_id: String,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_lat: f64,
    dropoff_lng: f64,
    status: String,
    assigned_driver_id: Option<String>,
    estimated_price_dkk: Option<f64>,
    final_price_dkk: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let status = TripStatus::from_str(&row.status).ok_or_else(|| {
            StoreError::Validation(format!("unknown trip status '{}'", row.status))
        })?;

        Ok(Trip {
            id: row.id,
            rider_id: row.rider_id,
            pickup: LatLng::new(row.pickup_lat, row.pickup_lng),
            dropoff: LatLng::new(row.dropoff_lat, row.dropoff_lng),
            status,
            assigned_driver_id: row.assigned_driver_id,
            estimated_price_dkk: row.estimated_price_dkk,
            final_price_dkk: row.final_price_dkk,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_TRIP: &str = r#"
    SELECT id, rider_id, pickup_lat, pickup_lng, dropoff_lat, dropoff_lng,
           status, assigned_driver_id, estimated_price_dkk, final_price_dkk,
           created_at, updated_at
    FROM trips
"#;

#[async_trait]
impl TripStore for PostgresTripStore {
    async fn create(&self, trip: Trip) -> Result<Trip, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO trips (
                id, rider_id, pickup_lat, pickup_lng, dropoff_lat, dropoff_lng,
                status, assigned_driver_id, estimated_price_dkk, final_price_dkk,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&trip.id)
        .bind(&trip.rider_id)
        .bind(trip.pickup.lat)
        .bind(trip.pickup.lng)
        .bind(trip.dropoff.lat)
        .bind(trip.dropoff.lng)
        .bind(trip.status.as_str())
        .bind(&trip.assigned_driver_id)
        .bind(trip.estimated_price_dkk)
        .bind(trip.final_price_dkk)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Validation(format!(
                "trip {} already exists",
                trip.id
            )));
        }

        Ok(trip)
    }

    async fn get(&self, id: &str) -> Result<Option<Trip>, StoreError> {
        let row: Option<TripRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_TRIP))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Trip::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Trip>, StoreError> {
        let rows: Vec<TripRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at, id", SELECT_TRIP))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn update(&self, id: &str, update: TripUpdate) -> Result<Trip, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so concurrent reactors serialize on this trip
        let row: Option<TripRow> =
            sqlx::query_as(&format!("{} WHERE id = $1 FOR UPDATE", SELECT_TRIP))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let mut trip = match row {
            Some(row) => Trip::try_from(row)?,
            None => return Err(StoreError::NotFound(id.to_string())),
        };

        update.apply(&mut trip)?;

        sqlx::query(
            r#"
            UPDATE trips
            SET status = $2,
                assigned_driver_id = $3,
                estimated_price_dkk = $4,
                final_price_dkk = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(&trip.id)
        .bind(trip.status.as_str())
        .bind(&trip.assigned_driver_id)
        .bind(trip.estimated_price_dkk)
        .bind(trip.final_price_dkk)
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(trip)
    }
}

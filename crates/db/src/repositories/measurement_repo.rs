//! Repository for the `body_measurements` table.

use sqlx::PgPool;
use atelier_core::types::DbId;

use crate::models::measurement::{MeasurementRecord, NewMeasurement};

/// Column list for `body_measurements` queries.
const COLUMNS: &str = "\
    id, user_id, measurements, confidence_score, image_filename, \
    manual_measurements, accuracy_metrics, created_at, updated_at";

pub struct MeasurementRepo;

impl MeasurementRepo {
    pub async fn create(
        pool: &PgPool,
        input: &NewMeasurement,
    ) -> Result<MeasurementRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO body_measurements \
                (user_id, measurements, confidence_score, image_filename, manual_measurements) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MeasurementRecord>(&query)
            .bind(&input.user_id)
            .bind(&input.measurements)
            .bind(input.confidence_score)
            .bind(&input.image_filename)
            .bind(&input.manual_measurements)
            .fetch_one(pool)
            .await
    }

    /// A user's measurement by ID. Rows owned by other users are not found.
    pub async fn find_for_user(
        pool: &PgPool,
        user_id: &str,
        id: DbId,
    ) -> Result<Option<MeasurementRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM body_measurements WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, MeasurementRecord>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn latest_for_user(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<MeasurementRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM body_measurements WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, MeasurementRecord>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's measurements, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MeasurementRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM body_measurements WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, MeasurementRecord>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Attach manual measurements and the accuracy comparison. Returns the
    /// updated row if found.
    pub async fn update_accuracy(
        pool: &PgPool,
        user_id: &str,
        id: DbId,
        manual: &serde_json::Value,
        accuracy: &serde_json::Value,
    ) -> Result<Option<MeasurementRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE body_measurements \
             SET manual_measurements = $1, accuracy_metrics = $2, updated_at = NOW() \
             WHERE id = $3 AND user_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MeasurementRecord>(&query)
            .bind(manual)
            .bind(accuracy)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}

//! Repository for the `fitting_records` table.

use sqlx::PgPool;

use crate::models::fitting::{DressPreference, FittingActivity, FittingRecord, NewFitting};

/// Column list for `fitting_records` queries.
const COLUMNS: &str = "\
    id, user_id, session_id, dress_type, dress_config, measurements, \
    satisfaction_rating, notes, duration_seconds, frame_count, created_at";

/// Insert and query operations for fitting records.
pub struct FittingRepo;

impl FittingRepo {
    /// Insert a fitting record, returning the full row.
    pub async fn create(pool: &PgPool, input: &NewFitting) -> Result<FittingRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO fitting_records \
                (user_id, session_id, dress_type, dress_config, measurements, \
                 satisfaction_rating, notes, duration_seconds, frame_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FittingRecord>(&query)
            .bind(&input.user_id)
            .bind(&input.session_id)
            .bind(&input.dress_type)
            .bind(&input.dress_config)
            .bind(&input.measurements)
            .bind(input.satisfaction_rating)
            .bind(&input.notes)
            .bind(input.duration_seconds)
            .bind(input.frame_count)
            .fetch_one(pool)
            .await
    }

    /// List a user's fittings, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FittingRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM fitting_records WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, FittingRecord>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM fitting_records WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// Per dress type: fitting count, mean duration and mean rating.
    pub async fn preferences_for_user(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Vec<DressPreference>, sqlx::Error> {
        sqlx::query_as::<_, DressPreference>(
            "SELECT dress_type, \
                    COUNT(*) AS count, \
                    AVG(duration_seconds) AS avg_duration_seconds, \
                    AVG(satisfaction_rating)::DOUBLE PRECISION AS avg_rating \
             FROM fitting_records WHERE user_id = $1 \
             GROUP BY dress_type \
             ORDER BY count DESC, dress_type",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// The user's most recent fittings, newest first.
    pub async fn recent_for_user(
        pool: &PgPool,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<FittingActivity>, sqlx::Error> {
        sqlx::query_as::<_, FittingActivity>(
            "SELECT id, dress_type, duration_seconds, satisfaction_rating, created_at \
             FROM fitting_records WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

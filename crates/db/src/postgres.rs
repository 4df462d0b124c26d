use async_trait::async_trait;
use atelier_core::types::DbId;

use crate::models::fitting::{FittingAnalytics, FittingRecord, NewFitting, RECENT_ACTIVITY_LIMIT};
use crate::models::measurement::{MeasurementRecord, NewMeasurement};
use crate::repositories::{FittingRepo, MeasurementRepo};
use crate::store::{validate_fitting, FittingStore, StoreError};
use crate::DbPool;

/// [`FittingStore`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgFittingStore {
    pool: DbPool,
}

impl PgFittingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl FittingStore for PgFittingStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn save_fitting(&self, input: NewFitting) -> Result<FittingRecord, StoreError> {
        validate_fitting(&input)?;
        Ok(FittingRepo::create(&self.pool, &input).await?)
    }

    async fn list_fittings(
        &self,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<FittingRecord>, StoreError> {
        Ok(FittingRepo::list_for_user(&self.pool, user_id, limit, skip).await?)
    }

    async fn count_fittings(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(FittingRepo::count_for_user(&self.pool, user_id).await?)
    }

    async fn fitting_analytics(&self, user_id: &str) -> Result<FittingAnalytics, StoreError> {
        let (total_sessions, dress_preferences, recent_activity) = tokio::try_join!(
            FittingRepo::count_for_user(&self.pool, user_id),
            FittingRepo::preferences_for_user(&self.pool, user_id),
            FittingRepo::recent_for_user(&self.pool, user_id, RECENT_ACTIVITY_LIMIT),
        )?;
        Ok(FittingAnalytics {
            total_sessions,
            dress_preferences,
            recent_activity,
        })
    }

    async fn save_measurement(&self, input: NewMeasurement) -> Result<MeasurementRecord, StoreError> {
        Ok(MeasurementRepo::create(&self.pool, &input).await?)
    }

    async fn get_latest_measurement(
        &self,
        user_id: &str,
    ) -> Result<Option<MeasurementRecord>, StoreError> {
        Ok(MeasurementRepo::latest_for_user(&self.pool, user_id).await?)
    }

    async fn list_measurements(
        &self,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MeasurementRecord>, StoreError> {
        Ok(MeasurementRepo::list_for_user(&self.pool, user_id, limit, skip).await?)
    }

    async fn get_measurement(
        &self,
        user_id: &str,
        id: DbId,
    ) -> Result<Option<MeasurementRecord>, StoreError> {
        Ok(MeasurementRepo::find_for_user(&self.pool, user_id, id).await?)
    }

    async fn record_accuracy(
        &self,
        user_id: &str,
        id: DbId,
        manual: serde_json::Value,
        accuracy: serde_json::Value,
    ) -> Result<Option<MeasurementRecord>, StoreError> {
        Ok(MeasurementRepo::update_accuracy(&self.pool, user_id, id, &manual, &accuracy).await?)
    }
}

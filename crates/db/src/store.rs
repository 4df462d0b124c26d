//! The persistence seam the API depends on.

use async_trait::async_trait;
use atelier_core::types::DbId;

use crate::models::fitting::{FittingAnalytics, FittingRecord, NewFitting};
use crate::models::measurement::{MeasurementRecord, NewMeasurement};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid record: {0}")]
    Invalid(String),
}

/// Storage for fitting sessions and measurements.
///
/// All reads are scoped to a user: a record owned by someone else behaves as
/// if it did not exist.
#[async_trait]
pub trait FittingStore: Send + Sync {
    /// Short backend label (`"postgres"`, `"memory"`).
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), StoreError>;

    async fn save_fitting(&self, input: NewFitting) -> Result<FittingRecord, StoreError>;

    /// Newest first.
    async fn list_fittings(
        &self,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<FittingRecord>, StoreError>;

    async fn count_fittings(&self, user_id: &str) -> Result<i64, StoreError>;

    /// Totals per dress type and the most recent fittings of one user.
    async fn fitting_analytics(&self, user_id: &str) -> Result<FittingAnalytics, StoreError>;

    async fn save_measurement(&self, input: NewMeasurement) -> Result<MeasurementRecord, StoreError>;

    async fn get_latest_measurement(
        &self,
        user_id: &str,
    ) -> Result<Option<MeasurementRecord>, StoreError>;

    /// Newest first.
    async fn list_measurements(
        &self,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MeasurementRecord>, StoreError>;

    async fn get_measurement(
        &self,
        user_id: &str,
        id: DbId,
    ) -> Result<Option<MeasurementRecord>, StoreError>;

    /// Attach manual measurements and accuracy metrics to an existing record.
    async fn record_accuracy(
        &self,
        user_id: &str,
        id: DbId,
        manual: serde_json::Value,
        accuracy: serde_json::Value,
    ) -> Result<Option<MeasurementRecord>, StoreError>;
}

/// Reject fitting input the schema would refuse.
pub(crate) fn validate_fitting(input: &NewFitting) -> Result<(), StoreError> {
    if let Some(rating) = input.satisfaction_rating {
        if !(1..=5).contains(&rating) {
            return Err(StoreError::Invalid(format!(
                "satisfaction_rating must be between 1 and 5, got {rating}"
            )));
        }
    }
    if input.duration_seconds < 0.0 || input.frame_count < 0 {
        return Err(StoreError::Invalid(
            "duration_seconds and frame_count must not be negative".to_string(),
        ));
    }
    Ok(())
}

//! In-process [`FittingStore`], used when no `DATABASE_URL` is configured.
//!
//! Data lives for the lifetime of the process.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use atelier_core::types::DbId;

use crate::models::fitting::{
    DressPreference, FittingActivity, FittingAnalytics, FittingRecord, NewFitting,
    RECENT_ACTIVITY_LIMIT,
};
use crate::models::measurement::{MeasurementRecord, NewMeasurement};
use crate::store::{validate_fitting, FittingStore, StoreError};

#[derive(Default)]
struct Tables {
    fittings: Vec<FittingRecord>,
    measurements: Vec<MeasurementRecord>,
    next_id: DbId,
}

impl Tables {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryFittingStore {
    tables: RwLock<Tables>,
}

impl MemoryFittingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest-first page of the rows matching `user_id`. Rows are stored in
/// insertion order, so newest first is reverse order.
fn page<T: Clone>(rows: &[T], owner: impl Fn(&T) -> bool, skip: i64, limit: i64) -> Vec<T> {
    rows.iter()
        .rev()
        .filter(|r| owner(r))
        .skip(skip.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl FittingStore for MemoryFittingStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_fitting(&self, input: NewFitting) -> Result<FittingRecord, StoreError> {
        validate_fitting(&input)?;
        let mut tables = self.tables.write().await;
        let record = FittingRecord {
            id: tables.allocate_id(),
            user_id: input.user_id,
            session_id: input.session_id,
            dress_type: input.dress_type,
            dress_config: input.dress_config,
            measurements: input.measurements,
            satisfaction_rating: input.satisfaction_rating,
            notes: input.notes,
            duration_seconds: input.duration_seconds,
            frame_count: input.frame_count,
            created_at: Utc::now(),
        };
        tables.fittings.push(record.clone());
        Ok(record)
    }

    async fn list_fittings(
        &self,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<FittingRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(page(&tables.fittings, |r| r.user_id == user_id, skip, limit))
    }

    async fn count_fittings(&self, user_id: &str) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.fittings.iter().filter(|r| r.user_id == user_id).count() as i64)
    }

    async fn fitting_analytics(&self, user_id: &str) -> Result<FittingAnalytics, StoreError> {
        let tables = self.tables.read().await;
        let owned: Vec<&FittingRecord> =
            tables.fittings.iter().filter(|r| r.user_id == user_id).collect();

        let mut groups: BTreeMap<&str, Vec<&FittingRecord>> = BTreeMap::new();
        for record in &owned {
            groups.entry(record.dress_type.as_str()).or_default().push(*record);
        }
        let mut dress_preferences: Vec<DressPreference> = groups
            .into_iter()
            .map(|(dress_type, records)| {
                let count = records.len() as f64;
                let ratings: Vec<f64> = records
                    .iter()
                    .filter_map(|r| r.satisfaction_rating.map(f64::from))
                    .collect();
                DressPreference {
                    dress_type: dress_type.to_string(),
                    count: records.len() as i64,
                    avg_duration_seconds: records.iter().map(|r| r.duration_seconds).sum::<f64>()
                        / count,
                    avg_rating: (!ratings.is_empty())
                        .then(|| ratings.iter().sum::<f64>() / ratings.len() as f64),
                }
            })
            .collect();
        dress_preferences.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.dress_type.cmp(&b.dress_type))
        });

        let recent_activity = owned
            .iter()
            .rev()
            .take(RECENT_ACTIVITY_LIMIT as usize)
            .map(|r| FittingActivity {
                id: r.id,
                dress_type: r.dress_type.clone(),
                duration_seconds: r.duration_seconds,
                satisfaction_rating: r.satisfaction_rating,
                created_at: r.created_at,
            })
            .collect();

        Ok(FittingAnalytics {
            total_sessions: owned.len() as i64,
            dress_preferences,
            recent_activity,
        })
    }

    async fn save_measurement(&self, input: NewMeasurement) -> Result<MeasurementRecord, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = MeasurementRecord {
            id: tables.allocate_id(),
            user_id: input.user_id,
            measurements: input.measurements,
            confidence_score: input.confidence_score,
            image_filename: input.image_filename,
            manual_measurements: input.manual_measurements,
            accuracy_metrics: None,
            created_at: now,
            updated_at: now,
        };
        tables.measurements.push(record.clone());
        Ok(record)
    }

    async fn get_latest_measurement(
        &self,
        user_id: &str,
    ) -> Result<Option<MeasurementRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .measurements
            .iter()
            .rev()
            .find(|r| r.user_id == user_id)
            .cloned())
    }

    async fn list_measurements(
        &self,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MeasurementRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(page(&tables.measurements, |r| r.user_id == user_id, skip, limit))
    }

    async fn get_measurement(
        &self,
        user_id: &str,
        id: DbId,
    ) -> Result<Option<MeasurementRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .measurements
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .cloned())
    }

    async fn record_accuracy(
        &self,
        user_id: &str,
        id: DbId,
        manual: serde_json::Value,
        accuracy: serde_json::Value,
    ) -> Result<Option<MeasurementRecord>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables
            .measurements
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
        else {
            return Ok(None);
        };
        record.manual_measurements = Some(manual);
        record.accuracy_metrics = Some(accuracy);
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }
}

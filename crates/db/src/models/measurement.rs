//! Body measurement entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use atelier_core::types::{DbId, Timestamp, UserId};

/// A row from the `body_measurements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MeasurementRecord {
    pub id: DbId,
    pub user_id: UserId,
    pub measurements: serde_json::Value,
    pub confidence_score: f32,
    pub image_filename: Option<String>,
    pub manual_measurements: Option<serde_json::Value>,
    pub accuracy_metrics: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for storing a new measurement set.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMeasurement {
    pub user_id: UserId,
    pub measurements: serde_json::Value,
    pub confidence_score: f32,
    pub image_filename: Option<String>,
    pub manual_measurements: Option<serde_json::Value>,
}

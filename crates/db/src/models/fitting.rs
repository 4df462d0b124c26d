//! Fitting record entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use atelier_core::types::{DbId, Timestamp, UserId};

/// A row from the `fitting_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FittingRecord {
    pub id: DbId,
    pub user_id: UserId,
    pub session_id: String,
    pub dress_type: String,
    pub dress_config: serde_json::Value,
    pub measurements: Option<serde_json::Value>,
    pub satisfaction_rating: Option<i16>,
    pub notes: Option<String>,
    pub duration_seconds: f64,
    pub frame_count: i64,
    pub created_at: Timestamp,
}

/// DTO for saving a completed fitting session.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFitting {
    pub user_id: UserId,
    pub session_id: String,
    pub dress_type: String,
    pub dress_config: serde_json::Value,
    pub measurements: Option<serde_json::Value>,
    /// 1–5.
    pub satisfaction_rating: Option<i16>,
    pub notes: Option<String>,
    pub duration_seconds: f64,
    pub frame_count: i64,
}

/// Number of fittings reported as recent activity.
pub const RECENT_ACTIVITY_LIMIT: i64 = 5;

/// Usage of one dress type across a user's fittings.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DressPreference {
    pub dress_type: String,
    pub count: i64,
    pub avg_duration_seconds: f64,
    /// `None` when no fitting of this type was rated.
    pub avg_rating: Option<f64>,
}

/// Summary row of a recent fitting.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct FittingActivity {
    pub id: DbId,
    pub dress_type: String,
    pub duration_seconds: f64,
    pub satisfaction_rating: Option<i16>,
    pub created_at: Timestamp,
}

/// A user's fitting history in aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct FittingAnalytics {
    pub total_sessions: i64,
    /// Most used dress type first.
    pub dress_preferences: Vec<DressPreference>,
    /// Newest first, at most [`RECENT_ACTIVITY_LIMIT`] entries.
    pub recent_activity: Vec<FittingActivity>,
}

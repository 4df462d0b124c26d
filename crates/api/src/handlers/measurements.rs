//! Handlers for body measurements: single-image measurement, manual entry,
//! saving streamed results, history and accuracy analysis against manual
//! values.

use std::collections::BTreeMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;
use atelier_core::error::{CoreError, FrameError};
use atelier_core::measurement::{analyze_accuracy, AccuracyReport, MeasurementName, MeasurementSet};
use atelier_core::types::DbId;
use atelier_db::models::measurement::{MeasurementRecord, NewMeasurement};
use atelier_db::models::PageParams;
use atelier_pipeline::FramePayload;

use crate::error::{AppError, AppResult};
use crate::handlers::upload::read_image_form;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default page size for measurement history.
const DEFAULT_MEASUREMENTS_PAGE: i64 = 50;

/// Confidence assigned to manually entered or streamed measurements when
/// none is given.
const DEFAULT_MANUAL_CONFIDENCE: f32 = 0.8;

type MeasurementMap = BTreeMap<MeasurementName, f64>;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Measurement",
        id: id.to_string(),
    })
}

fn to_json<T: Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::InternalError(e.to_string()))
}

fn check_values(values: &MeasurementMap) -> AppResult<()> {
    if values.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "measurements must not be empty".to_string(),
        )));
    }
    if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite() || **v <= 0.0) {
        return Err(AppError::Core(CoreError::Validation(format!(
            "measurement {name:?} must be a positive number, got {value}"
        ))));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct UploadedMeasurement {
    pub measurement: MeasurementRecord,
    pub measurements: MeasurementSet,
    pub confidence: f32,
}

/// POST /api/v1/measurements/upload
///
/// Multipart form with an image `file` (JPEG, PNG or WebP, at most 10 MB).
/// The image is measured synchronously and the result stored.
pub async fn upload(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadedMeasurement>>)> {
    let pipeline = state.pipeline()?;
    let form = read_image_form(multipart).await?;
    let filename = form.image.filename.clone();

    let (set, confidence) = pipeline
        .measure(FramePayload::Bytes(form.image.bytes))
        .await
        .map_err(|e| match e {
            FrameError::InvalidFrame(reason) => {
                AppError::BadRequest(format!("Could not process image: {reason}"))
            }
            FrameError::NoPoseDetected => {
                AppError::BadRequest("No person detected in the image".to_string())
            }
            FrameError::EnhancementUnavailable(reason) => AppError::ServiceUnavailable(reason),
            FrameError::Processing(reason) => AppError::InternalError(reason),
        })?;

    let record = state
        .store
        .save_measurement(NewMeasurement {
            user_id: auth.user_id.clone(),
            measurements: to_json(&set.values)?,
            confidence_score: confidence,
            image_filename: filename,
            manual_measurements: None,
        })
        .await?;
    tracing::info!(
        user_id = %auth.user_id,
        measurement_id = record.id,
        confidence,
        fallback = set.is_fallback(),
        "Measured uploaded image"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadedMeasurement {
                measurement: record,
                measurements: set,
                confidence,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Manual entry and history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMeasurementRequest {
    pub measurements: MeasurementMap,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: Option<f32>,
    #[validate(length(max = 255))]
    pub image_filename: Option<String>,
}

/// POST /api/v1/measurements
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateMeasurementRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<MeasurementRecord>>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    let record = store_values(
        &state,
        &auth,
        &input.measurements,
        input.confidence,
        input.image_filename,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

/// Filename recorded for measurements kept from the realtime stream.
const REALTIME_FILENAME: &str = "realtime_capture";

#[derive(Debug, Deserialize, Validate)]
pub struct SaveRealtimeRequest {
    pub measurements: MeasurementMap,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: Option<f32>,
}

/// POST /api/v1/measurements/save-realtime
///
/// Keep a result previously received on the realtime stream.
pub async fn save_realtime(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SaveRealtimeRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<MeasurementRecord>>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    let record = store_values(
        &state,
        &auth,
        &input.measurements,
        input.confidence,
        Some(REALTIME_FILENAME.to_string()),
    )
    .await?;
    tracing::info!(
        user_id = %auth.user_id,
        measurement_id = record.id,
        "Saved realtime measurement"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

async fn store_values(
    state: &AppState,
    auth: &AuthUser,
    values: &MeasurementMap,
    confidence: Option<f32>,
    image_filename: Option<String>,
) -> AppResult<MeasurementRecord> {
    check_values(values)?;
    let record = state
        .store
        .save_measurement(NewMeasurement {
            user_id: auth.user_id.clone(),
            measurements: to_json(values)?,
            confidence_score: confidence.unwrap_or(DEFAULT_MANUAL_CONFIDENCE),
            image_filename,
            manual_measurements: None,
        })
        .await?;
    Ok(record)
}

/// GET /api/v1/measurements?skip=&limit=
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let (skip, limit) = params.resolve(DEFAULT_MEASUREMENTS_PAGE);
    let records = state
        .store
        .list_measurements(&auth.user_id, skip, limit)
        .await?;
    Ok(Json(DataResponse { data: records }))
}

/// GET /api/v1/measurements/latest
pub async fn latest(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let record = state
        .store
        .get_latest_measurement(&auth.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Measurement",
                id: "latest".to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: record }))
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AccuracyRequest {
    pub manual_measurements: MeasurementMap,
}

#[derive(Debug, Serialize)]
pub struct AccuracyResponse {
    pub measurement_id: DbId,
    #[serde(flatten)]
    pub report: AccuracyReport,
}

/// POST /api/v1/measurements/{id}/accuracy
///
/// Compare a stored measurement with manually taken values and keep both the
/// manual values and the resulting metrics on the record.
pub async fn accuracy(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AccuracyRequest>,
) -> AppResult<impl IntoResponse> {
    check_values(&input.manual_measurements)?;

    let record = state
        .store
        .get_measurement(&auth.user_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let stored: MeasurementMap = serde_json::from_value(record.measurements).map_err(|e| {
        AppError::InternalError(format!("Stored measurements are unreadable: {e}"))
    })?;

    let report = analyze_accuracy(&stored, &input.manual_measurements);
    state
        .store
        .record_accuracy(
            &auth.user_id,
            id,
            to_json(&input.manual_measurements)?,
            to_json(&report)?,
        )
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(
        user_id = %auth.user_id,
        measurement_id = id,
        overall_accuracy = report.overall_accuracy,
        "Accuracy recorded"
    );

    Ok(Json(DataResponse {
        data: AccuracyResponse {
            measurement_id: id,
            report,
        },
    }))
}

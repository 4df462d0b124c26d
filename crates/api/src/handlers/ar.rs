//! Handlers for AR dress fitting: templates, single-frame processing, live
//! session inspection, and fitting history.
//!
//! All endpoints except the template list require authentication via
//! [`AuthUser`].

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;
use atelier_core::error::CoreError;
use atelier_core::garment::{self, GarmentConfig, GarmentConfigInput, GarmentType};
use atelier_db::models::fitting::{FittingRecord, NewFitting};
use atelier_db::models::PageParams;
use atelier_pipeline::FramePayload;

use crate::error::{AppError, AppResult};
use crate::handlers::upload::read_image_form;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::ws::{AdminNotice, SessionSnapshot};

/// Default page size for fitting history.
const DEFAULT_FITTINGS_PAGE: i64 = 10;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// GET /api/v1/ar/dress-templates
pub async fn list_dress_templates() -> impl IntoResponse {
    Json(DataResponse {
        data: garment::dress_templates(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CustomizeDressRequest {
    pub template_id: String,
    #[serde(default)]
    pub customizations: GarmentConfigInput,
}

/// POST /api/v1/ar/customize-dress
///
/// Apply customisations to a template. The template decides the garment type.
pub async fn customize_dress(
    auth: AuthUser,
    Json(input): Json<CustomizeDressRequest>,
) -> AppResult<impl IntoResponse> {
    let dress = garment::customize_dress(&input.template_id, input.customizations)?;
    tracing::debug!(user_id = %auth.user_id, dress_id = %dress.id, "Customized dress");
    Ok(Json(DataResponse { data: dress }))
}

// ---------------------------------------------------------------------------
// Single frame
// ---------------------------------------------------------------------------

/// POST /api/v1/ar/process-frame
///
/// Multipart form with a required image `file`, an optional `dress_config`
/// JSON field and an optional `enhance` flag. Always answers with a frame
/// result; processing failures are reported inside it.
pub async fn process_frame(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let pipeline = state.pipeline()?;
    let form = read_image_form(multipart).await?;

    let dress_config = match form.fields.get("dress_config") {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<Value>(raw)
            .map_err(|e| AppError::BadRequest(format!("dress_config is not valid JSON: {e}")))?,
        _ => serde_json::json!({ "type": GarmentType::default() }),
    };
    let enhance = form
        .fields
        .get("enhance")
        .map(|v| matches!(v.trim(), "true" | "1"));

    let result = pipeline
        .process(FramePayload::Bytes(form.image.bytes), &dress_config, enhance)
        .await;
    tracing::debug!(
        user_id = %auth.user_id,
        success = result.success,
        elapsed_ms = result.processing_time_ms,
        "Processed uploaded frame"
    );

    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Live sessions
// ---------------------------------------------------------------------------

/// A live session the caller may see: their own, an anonymous one, or any
/// session for admins. Others behave as if they did not exist.
async fn visible_session(
    state: &AppState,
    auth: &AuthUser,
    session_id: &str,
) -> AppResult<SessionSnapshot> {
    state
        .sessions
        .get(session_id)
        .await
        .filter(|s| {
            auth.is_admin() || s.user_id.as_deref().map_or(true, |owner| owner == auth.user_id)
        })
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Session",
                id: session_id.to_string(),
            })
        })
}

/// GET /api/v1/ar/sessions/{id}/stats
pub async fn session_stats(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let snapshot = visible_session(&state, &auth, &session_id).await?;
    Ok(Json(DataResponse {
        data: snapshot.stats(chrono::Utc::now()),
    }))
}

/// DELETE /api/v1/ar/sessions/{id}
///
/// Terminate a live session. Its connection receives a Close frame.
pub async fn terminate_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    visible_session(&state, &auth, &session_id).await?;
    state.sessions.close(&session_id).await;
    tracing::info!(user_id = %auth.user_id, session_id = %session_id, "Session terminated");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveFittingRequest {
    /// Defaults to the session's current garment.
    pub dress_type: Option<GarmentType>,
    /// Defaults to the session's current garment config.
    pub dress_config: Option<Value>,
    pub measurements: Option<Value>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i16>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// POST /api/v1/ar/sessions/{id}/fittings
///
/// Save the outcome of a live session. Duration and frame count come from
/// the session itself.
pub async fn save_fitting(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<SaveFittingRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<FittingRecord>>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    let snapshot = visible_session(&state, &auth, &session_id).await?;

    let current = snapshot.current_garment.clone();
    let dress_type = input
        .dress_type
        .or(current.as_ref().map(|g| g.garment_type))
        .unwrap_or_default();
    let dress_config = match input.dress_config {
        Some(config) => config,
        None => {
            let config = current.unwrap_or_else(|| GarmentConfig::for_type(dress_type));
            serde_json::to_value(&config).map_err(|e| AppError::InternalError(e.to_string()))?
        }
    };

    let record = state
        .store
        .save_fitting(NewFitting {
            user_id: auth.user_id.clone(),
            session_id: session_id.clone(),
            dress_type: dress_type.as_str().to_string(),
            dress_config,
            measurements: input.measurements,
            satisfaction_rating: input.rating,
            notes: input.notes,
            duration_seconds: snapshot.duration_seconds(chrono::Utc::now()),
            frame_count: snapshot.frame_count as i64,
        })
        .await?;
    tracing::info!(user_id = %auth.user_id, session_id = %session_id, fitting_id = record.id, "Fitting saved");

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

#[derive(Debug, Serialize)]
pub struct FittingPage {
    pub fittings: Vec<FittingRecord>,
    pub total_count: i64,
    pub page_size: i64,
    pub current_page: i64,
}

/// GET /api/v1/ar/fittings?skip=&limit=
///
/// The caller's fitting history, newest first.
pub async fn list_fittings(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let (skip, limit) = params.resolve(DEFAULT_FITTINGS_PAGE);
    let fittings = state.store.list_fittings(&auth.user_id, skip, limit).await?;
    let total_count = state.store.count_fittings(&auth.user_id).await?;

    Ok(Json(DataResponse {
        data: FittingPage {
            fittings,
            total_count,
            page_size: limit,
            current_page: skip / limit + 1,
        },
    }))
}

/// GET /api/v1/ar/analytics
///
/// Fitting counts, mean duration and mean rating per dress type, plus the
/// caller's most recent fittings.
pub async fn analytics(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let analytics = state.store.fitting_analytics(&auth.user_id).await?;
    Ok(Json(DataResponse { data: analytics }))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BroadcastResult {
    pub delivered: usize,
}

/// POST /api/v1/ar/admin/broadcast
///
/// Push an operational notice to every active session. Admin only.
pub async fn broadcast_notice(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(notice): Json<AdminNotice>,
) -> AppResult<impl IntoResponse> {
    notice
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let delivered = state.sessions.broadcast_notice(&notice).await;
    tracing::info!(user_id = %admin.user_id, delivered, "Admin notice broadcast");

    Ok(Json(DataResponse {
        data: BroadcastResult { delivered },
    }))
}

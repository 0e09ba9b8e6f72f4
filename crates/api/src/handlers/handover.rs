//! Handlers for handover notes.
//!
//! Handovers run under the optimistic policy: no lock endpoints, writes
//! always apply, and a stale `expected_version` comes back as a warning.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use validator::Validate;

use lastmile_core::error::CoreError;
use lastmile_core::types::DbId;
use lastmile_db::models::handover::{
    CreateHandover, Handover, HandoverListQuery, UpdateHandover,
};
use lastmile_db::repositories::HandoverRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Paginated handover list payload.
#[derive(Debug, Serialize)]
pub struct HandoverListResponse {
    pub items: Vec<Handover>,
    pub total: i64,
}

/// GET /handovers?is_notice=&department=&page=&page_size=
pub async fn list_handovers(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<HandoverListQuery>,
) -> AppResult<impl IntoResponse> {
    let (items, total) = HandoverRepo::list(&state.pool, &filter).await?;
    Ok(Json(DataResponse {
        data: HandoverListResponse { items, total },
    }))
}

/// POST /handovers
///
/// Create a handover note. Posting a notice requires the admin role.
pub async fn create_handover(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateHandover>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let handover =
        HandoverRepo::create(&state.pool, &input, auth.user_id, auth.role, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: handover })))
}

/// GET /handovers/{id}
pub async fn get_handover(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let handover = HandoverRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "handover",
            id,
        }))?;

    Ok(Json(DataResponse { data: handover }))
}

/// PATCH /handovers/{id}
///
/// Update a handover note. Author-or-admin; the notice flag is admin-only.
pub async fn update_handover(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(changes): Json<UpdateHandover>,
) -> AppResult<impl IntoResponse> {
    changes
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let updated = HandoverRepo::update_record(
        &state.pool,
        id,
        &changes,
        auth.user_id,
        auth.role,
        Utc::now(),
    )
    .await?;

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /handovers/{id}
///
/// Delete a handover note. Author-or-admin.
pub async fn delete_handover(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    HandoverRepo::delete(&state.pool, id, auth.user_id, auth.role).await?;
    Ok(StatusCode::NO_CONTENT)
}

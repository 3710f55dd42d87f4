use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::MemberClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/waitlist/{class_id}/position", get(position))
        .route("/v1/waitlist/{class_id}/size", get(size))
        .route("/v1/waitlist/{class_id}", post(join).delete(leave))
}

#[derive(Debug, Serialize)]
struct PositionResponse {
    /// 1-based rank, or -1 when the user is not on the waitlist.
    position: i64,
}

async fn position(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<PositionResponse>, AppError> {
    let user_id = claims.user_id()?;
    let position = state
        .engine
        .waitlist_position(&user_id, &class_id)
        .map(|p| p as i64)
        .unwrap_or(-1);

    Ok(Json(PositionResponse { position }))
}

#[derive(Debug, Serialize)]
struct SizeResponse {
    size: usize,
}

async fn size(
    State(state): State<AppState>,
    Path(class_id): Path<Uuid>,
) -> Json<SizeResponse> {
    Json(SizeResponse {
        size: state.engine.waitlist_size(&class_id),
    })
}

#[derive(Debug, Serialize)]
struct JoinResponse {
    position: usize,
}

async fn join(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<JoinResponse>, AppError> {
    let user_id = claims.user_id()?;
    let position = state.engine.join_waitlist(user_id, class_id)?;
    Ok(Json(JoinResponse { position }))
}

#[derive(Debug, Serialize)]
struct LeaveResponse {
    removed: bool,
}

async fn leave(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<LeaveResponse>, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(LeaveResponse {
        removed: state.engine.leave_waitlist(&user_id, &class_id),
    }))
}

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strive_catalog::ClassSession;
use tracing::error;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/classes", post(create_class))
        .route("/v1/admin/classes/{id}/capacity", post(increase_capacity))
        .route("/v1/admin/classes/{id}/promote", post(promote))
        .route("/v1/admin/classes/{id}/end", post(end_class))
        .route("/v1/admin/packages/refund", post(refund_credits))
        .route("/v1/admin/sweeps/packages", post(sweep_packages))
        .route("/v1/admin/sweeps/waitlist", post(sweep_waitlist))
        .route("/v1/admin/sweeps/classes", post(sweep_classes))
}

#[derive(Debug, Deserialize)]
struct CreateClassRequest {
    name: String,
    country_code: String,
    required_credits: i32,
    total_slots: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

async fn create_class(
    State(state): State<AppState>,
    Json(req): Json<CreateClassRequest>,
) -> Result<Json<ClassSession>, AppError> {
    if req.total_slots <= 0 {
        return Err(AppError::ValidationError(
            "total_slots must be positive".to_string(),
        ));
    }
    if req.end_time <= req.start_time {
        return Err(AppError::ValidationError(
            "end_time must be after start_time".to_string(),
        ));
    }

    let session = ClassSession::new(
        req.name,
        req.country_code,
        req.required_credits,
        req.total_slots,
        req.start_time,
        req.end_time,
    );
    state.engine.add_class(session.clone());

    if let Err(e) = state.class_repo.save_class(&session).await {
        error!("Failed to mirror class {}: {}", session.id, e);
    }

    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
struct CapacityRequest {
    extra_slots: i32,
}

#[derive(Debug, Serialize)]
struct CapacityResponse {
    class_id: Uuid,
    total_slots: i32,
}

async fn increase_capacity(
    State(state): State<AppState>,
    Path(class_id): Path<Uuid>,
    Json(req): Json<CapacityRequest>,
) -> Result<Json<CapacityResponse>, AppError> {
    let total_slots = state
        .engine
        .increase_capacity(class_id, req.extra_slots)
        .await?;

    if let Some(class) = state.engine.class(&class_id) {
        if let Err(e) = state.class_repo.save_class(&class).await {
            error!("Failed to mirror class {}: {}", class_id, e);
        }
    }

    Ok(Json(CapacityResponse {
        class_id,
        total_slots,
    }))
}

#[derive(Debug, Serialize)]
struct PromoteResponse {
    promoted: Option<strive_booking::Booking>,
}

async fn promote(
    State(state): State<AppState>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<PromoteResponse>, AppError> {
    let promoted = state.engine.promote(class_id).await?;

    if let Some(booking) = &promoted {
        if let Err(e) = state.booking_repo.save_booking(booking).await {
            error!("Failed to mirror booking {}: {}", booking.id, e);
        }
    }

    Ok(Json(PromoteResponse { promoted }))
}

#[derive(Debug, Deserialize)]
struct RefundRequest {
    user_id: Uuid,
    credits: i32,
}

#[derive(Debug, Serialize)]
struct RefundResponse {
    user_id: Uuid,
    remaining_credits: i32,
}

async fn refund_credits(
    State(state): State<AppState>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, AppError> {
    state.engine.refund_credits(req.user_id, req.credits)?;
    Ok(Json(RefundResponse {
        user_id: req.user_id,
        remaining_credits: state.engine.remaining_credits(&req.user_id),
    }))
}

#[derive(Debug, Serialize)]
struct EndClassResponse {
    class_id: Uuid,
    compensated: usize,
}

async fn end_class(
    State(state): State<AppState>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<EndClassResponse>, AppError> {
    let compensated = state.engine.end_of_class(class_id)?;
    Ok(Json(EndClassResponse {
        class_id,
        compensated,
    }))
}

#[derive(Debug, Serialize)]
struct SweepResponse {
    affected: usize,
}

async fn sweep_packages(State(state): State<AppState>) -> Json<SweepResponse> {
    Json(SweepResponse {
        affected: state.engine.expire_packages(),
    })
}

async fn sweep_waitlist(State(state): State<AppState>) -> Json<SweepResponse> {
    let ttl = Duration::days(state.business_rules.waitlist_entry_ttl_days);
    let removed = state.engine.expire_waitlist_entries(Utc::now() - ttl);
    Json(SweepResponse {
        affected: removed.len(),
    })
}

async fn sweep_classes(State(state): State<AppState>) -> Json<SweepResponse> {
    Json(SweepResponse {
        affected: state.engine.sweep_ended_classes(),
    })
}

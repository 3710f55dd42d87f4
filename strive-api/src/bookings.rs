use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strive_booking::{Booking, BookingOutcome, CancelOutcome, CheckIn};
use strive_shared::events::{BookingCancelledEvent, BookingConfirmedEvent, WaitlistPromotedEvent};
use tracing::error;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::MemberClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/overlap", get(check_overlap))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/checkins", post(check_in))
}

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    class_id: Uuid,
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingOutcome>, AppError> {
    let user_id = claims.user_id()?;
    let outcome = state.engine.book(user_id, req.class_id).await?;

    if let BookingOutcome::Confirmed { booking } = &outcome {
        mirror_booking(&state, booking).await;
        mirror_class(&state, &req.class_id).await;
        state
            .kafka
            .booking_confirmed(&BookingConfirmedEvent {
                booking_id: booking.id,
                user_id,
                class_id: req.class_id,
                credits_used: booking.credits_used,
                timestamp: Utc::now().timestamp(),
            })
            .await;
    }

    Ok(Json(outcome))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelOutcome>, AppError> {
    let user_id = claims.user_id()?;
    let booking = state
        .engine
        .booking(&booking_id)
        .ok_or_else(|| AppError::NotFoundError(format!("Booking not found: {}", booking_id)))?;

    if booking.user_id != user_id && claims.role != "ADMIN" {
        return Err(AppError::AuthorizationError(
            "Booking does not belong to you".to_string(),
        ));
    }

    let outcome = state.engine.cancel(booking_id).await?;

    if let Some(cancelled) = state.engine.booking(&booking_id) {
        mirror_booking(&state, &cancelled).await;
    }
    mirror_class(&state, &booking.class_id).await;
    state
        .kafka
        .booking_cancelled(&BookingCancelledEvent {
            booking_id,
            user_id: booking.user_id,
            class_id: booking.class_id,
            refunded: outcome.refunded,
            timestamp: Utc::now().timestamp(),
        })
        .await;

    if let Some(promoted) = &outcome.promoted {
        mirror_booking(&state, promoted).await;
        state
            .kafka
            .waitlist_promoted(&WaitlistPromotedEvent {
                booking_id: promoted.id,
                user_id: promoted.user_id,
                class_id: promoted.class_id,
                timestamp: Utc::now().timestamp(),
            })
            .await;
    }

    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
struct BookingListResponse {
    bookings: Vec<Booking>,
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
) -> Result<Json<BookingListResponse>, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(BookingListResponse {
        bookings: state.engine.bookings_for_user(&user_id),
    }))
}

#[derive(Debug, Deserialize)]
struct OverlapQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct OverlapResponse {
    overlap: bool,
}

async fn check_overlap(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Query(query): Query<OverlapQuery>,
) -> Result<Json<OverlapResponse>, AppError> {
    let user_id = claims.user_id()?;
    if query.end <= query.start {
        return Err(AppError::ValidationError(
            "end must be after start".to_string(),
        ));
    }
    Ok(Json(OverlapResponse {
        overlap: state.engine.has_overlap(&user_id, query.start, query.end),
    }))
}

#[derive(Debug, Deserialize)]
struct CheckInRequest {
    class_id: Uuid,
}

async fn check_in(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Json(req): Json<CheckInRequest>,
) -> Result<Json<CheckIn>, AppError> {
    let user_id = claims.user_id()?;
    let check_in = state.engine.check_in(user_id, req.class_id)?;

    if let Err(e) = state.booking_repo.save_check_in(&check_in).await {
        error!("Failed to mirror check-in {}: {}", check_in.id, e);
    }

    Ok(Json(check_in))
}

async fn mirror_booking(state: &AppState, booking: &Booking) {
    if let Err(e) = state.booking_repo.save_booking(booking).await {
        error!("Failed to mirror booking {}: {}", booking.id, e);
    }
}

async fn mirror_class(state: &AppState, class_id: &Uuid) {
    if let Some(class) = state.engine.class(class_id) {
        if let Err(e) = state.class_repo.save_class(&class).await {
            error!("Failed to mirror class {}: {}", class_id, e);
        }
    }
}

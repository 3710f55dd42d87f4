use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strive_ledger::CreditGrant;
use strive_shared::events::PackagePurchasedEvent;

use crate::error::AppError;
use crate::middleware::auth::MemberClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/packages/purchase", post(purchase_package))
        .route("/v1/packages", get(list_packages))
        .route("/v1/packages/credits", get(remaining_credits))
}

#[derive(Debug, Deserialize)]
struct PurchaseRequest {
    country_code: String,
    credits: i32,
    valid_until: DateTime<Utc>,
}

async fn purchase_package(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<CreditGrant>, AppError> {
    let user_id = claims.user_id()?;
    let grant = state
        .engine
        .purchase_package(user_id, req.country_code, req.credits, req.valid_until)
        .await?;

    state
        .kafka
        .package_purchased(&PackagePurchasedEvent {
            grant_id: grant.id,
            user_id,
            credits: grant.credits,
            timestamp: Utc::now().timestamp(),
        })
        .await;

    Ok(Json(grant))
}

#[derive(Debug, Serialize)]
struct PackageListResponse {
    packages: Vec<CreditGrant>,
}

async fn list_packages(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
) -> Result<Json<PackageListResponse>, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(PackageListResponse {
        packages: state.engine.grants_for(&user_id),
    }))
}

#[derive(Debug, Serialize)]
struct CreditsResponse {
    remaining_credits: i32,
}

async fn remaining_credits(
    State(state): State<AppState>,
    Extension(claims): Extension<MemberClaims>,
) -> Result<Json<CreditsResponse>, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(CreditsResponse {
        remaining_credits: state.engine.remaining_credits(&user_id),
    }))
}

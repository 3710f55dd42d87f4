use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::auth::MemberClaims;
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
struct TokenRequest {
    /// Existing user id to mint a token for; omitted for a fresh guest.
    user_id: Option<Uuid>,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    "MEMBER".to_string()
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/token", post(issue_token))
}

/// Development token mint. Real identity lives in an external service; this
/// endpoint only exists so the API is drivable end to end.
async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user_id = req.user_id.unwrap_or_else(Uuid::new_v4);

    let claims = MemberClaims {
        sub: user_id.to_string(),
        role: req.role,
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse { token, user_id }))
}

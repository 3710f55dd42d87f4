use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use strive_catalog::ClassSession;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/classes", get(list_classes))
        .route("/v1/classes/{id}", get(get_class))
}

#[derive(Debug, Serialize)]
struct ClassView {
    #[serde(flatten)]
    session: ClassSession,
    remaining_slots: i32,
    waitlist_size: usize,
}

impl ClassView {
    fn new(session: ClassSession, waitlist_size: usize) -> Self {
        let remaining_slots = (session.total_slots - session.booked_slots).max(0);
        Self {
            session,
            remaining_slots,
            waitlist_size,
        }
    }
}

#[derive(Debug, Serialize)]
struct ClassListResponse {
    classes: Vec<ClassView>,
}

async fn list_classes(State(state): State<AppState>) -> Json<ClassListResponse> {
    let mut classes: Vec<ClassView> = state
        .engine
        .list_classes()
        .into_iter()
        .map(|session| {
            let waitlist_size = state.engine.waitlist_size(&session.id);
            ClassView::new(session, waitlist_size)
        })
        .collect();
    classes.sort_by_key(|view| view.session.start_time);

    Json(ClassListResponse { classes })
}

async fn get_class(
    State(state): State<AppState>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<ClassView>, AppError> {
    let session = state
        .engine
        .class(&class_id)
        .ok_or_else(|| AppError::NotFoundError(format!("Class not found: {}", class_id)))?;
    let waitlist_size = state.engine.waitlist_size(&class_id);

    Ok(Json(ClassView::new(session, waitlist_size)))
}

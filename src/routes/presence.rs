//! Presence listing — who is currently viewing a document.

use axum::Json;
use axum::extract::{Path, State};

use crate::services::registry::Participant;
use crate::state::AppState;

/// `GET /api/documents/{id}/presence`. Unknown documents yield an empty list.
pub async fn list_presence(State(state): State<AppState>, Path(document_id): Path<String>) -> Json<Vec<Participant>> {
    Json(state.registry.participants(&document_id).await)
}

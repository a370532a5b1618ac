use axum::{Json, debug_handler, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::info;

use crate::store::SharedStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewSession {
    session_id: String,
}

#[debug_handler]
pub(crate) async fn new_session(State(store): State<SharedStore>) -> impl IntoResponse {
    let session_id = store.lock().rooms.create_room();
    info!(%session_id, "session created");
    (StatusCode::CREATED, Json(NewSession { session_id }))
}

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{AppResult, store::SharedStore};

use super::directory::{RoomError, Session};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionInfo {
    id: String,
    participants: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            participants: session.participants.clone(),
            created_at: session.created_at,
        }
    }
}

#[debug_handler]
pub(crate) async fn session(
    State(store): State<SharedStore>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionInfo>> {
    let store = store.lock();
    let session = store
        .rooms
        .get_room(&session_id)
        .ok_or(RoomError::SessionNotFound(session_id))?;
    Ok(Json(session.into()))
}

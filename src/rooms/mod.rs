pub mod directory;
pub mod msg;
pub mod peers;
pub mod signaling;

mod new;
mod room;
mod ws;

use axum::{
    Json, Router, debug_handler,
    extract::State,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{AppState, store::SharedStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(new::new_session))
        .route("/sessions/{id}", get(room::session))
        .route("/ws", get(ws::signaling_ws))
        .route("/health", get(health))
}

#[debug_handler]
async fn health(State(store): State<SharedStore>) -> Json<Value> {
    let store = store.lock();
    Json(json!({
        "status": "ok",
        "sessions": store.rooms.session_count(),
        "members": store.rooms.member_count(),
    }))
}

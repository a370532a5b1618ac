pub mod appresult;
pub mod bubbles;
pub mod client;
pub mod config;
pub mod rooms;
pub mod store;

use axum::{Router, extract::FromRef};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
use store::SharedStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: SharedStore,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(rooms::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

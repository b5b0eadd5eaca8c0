pub mod cache;
pub mod config;
pub mod core;
pub mod db;
pub mod logging;
pub mod mastery;
pub mod planning;
pub mod response;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod workers;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn build_router(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

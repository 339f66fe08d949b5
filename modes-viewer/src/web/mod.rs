//! Web server — live plane updates over WebSocket plus the static viewer.
//!
//! Shared state is just the multiplexer: every `/events` connection becomes
//! one subscriber session.

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::mux::PlaneUpdates;

pub mod session;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub mux: Arc<PlaneUpdates>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the router. Unmatched paths are served from `static_dir` when given.
pub fn build_router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/events", get(session::events))
        .route("/api/stats", get(api_stats))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}

async fn api_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.mux.stats())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

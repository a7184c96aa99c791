use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    let mut router = Router::new()
        // Accounts
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        // Catalog
        .route("/catalog", get(handlers::get_catalog))
        .route("/catalog/load", post(handlers::load_catalog))
        .route(
            "/catalog/uploads",
            // Headroom over the file limit for the other multipart fields
            post(handlers::upload_score).layer(DefaultBodyLimit::max(upload_limit + 64 * 1024)),
        )
        .route("/catalog/records/:name", delete(handlers::delete_score))
        .route(
            "/catalog/preview",
            put(handlers::select_preview).delete(handlers::clear_preview),
        )
        .route("/catalog/preview/pages", post(handlers::record_page_count))
        // Blob content (local storage retrieval URLs)
        .route("/blobs/*key", get(handlers::serve_blob))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

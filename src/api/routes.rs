use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Harvest/listing
        .route("/v1/search", get(handlers::search))
        // Item lifecycle
        .route(
            "/v1/items/:identifier",
            put(handlers::put_item).delete(handlers::delete_item),
        )
        // Reindex administration
        .route("/v1/admin/reindex", post(handlers::reindex_all))
        .route("/v1/admin/reindex/stop", post(handlers::stop_reindex))
        .route("/v1/admin/reindex/status", get(handlers::reindex_status))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}

//! Router assembly for the graph rendering API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax. CORS is permissive
/// (editors call from various origins); TraceLayer provides
/// request-level logging via tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health::healthz))
        // Icon sets
        .route(
            "/icon-sets",
            get(handlers::icon_sets::list).post(handlers::icon_sets::create),
        )
        .route("/icon-sets/resolve", post(handlers::icon_sets::resolve))
        .route(
            "/icon-sets/{id}",
            get(handlers::icon_sets::get).put(handlers::icon_sets::update),
        )
        .route("/icon-sets/{id}/bundle", get(handlers::icon_sets::get_bundle))
        .route("/icon-sets/{id}/publish", post(handlers::icon_sets::publish))
        .route(
            "/icon-sets/{id}/entries/{key}",
            put(handlers::icon_sets::upsert_entry).delete(handlers::icon_sets::delete_entry),
        )
        // Layout sets
        .route(
            "/layout-sets",
            get(handlers::layout_sets::list).post(handlers::layout_sets::create),
        )
        .route(
            "/layout-sets/{id}",
            get(handlers::layout_sets::get)
                .put(handlers::layout_sets::update)
                .delete(handlers::layout_sets::delete),
        )
        .route(
            "/layout-sets/{id}/bundle",
            get(handlers::layout_sets::get_bundle),
        )
        .route(
            "/layout-sets/{id}/publish",
            post(handlers::layout_sets::publish),
        )
        .route(
            "/layout-sets/{id}/entries/{key}",
            put(handlers::layout_sets::upsert_entry).delete(handlers::layout_sets::delete_entry),
        )
        // Link sets
        .route(
            "/link-sets",
            get(handlers::link_sets::list).post(handlers::link_sets::create),
        )
        .route(
            "/link-sets/{id}",
            get(handlers::link_sets::get)
                .put(handlers::link_sets::update)
                .delete(handlers::link_sets::delete),
        )
        .route("/link-sets/{id}/bundle", get(handlers::link_sets::get_bundle))
        .route("/link-sets/{id}/publish", post(handlers::link_sets::publish))
        .route(
            "/link-sets/{id}/entries/{key}",
            put(handlers::link_sets::upsert_entry).delete(handlers::link_sets::delete_entry),
        )
        // Graph types
        .route(
            "/graph-types",
            get(handlers::graph_types::list).post(handlers::graph_types::create),
        )
        .route(
            "/graph-types/{id}",
            get(handlers::graph_types::get).put(handlers::graph_types::update),
        )
        .route(
            "/graph-types/{id}/bundle",
            get(handlers::graph_types::get_bundle),
        )
        .route(
            "/graph-types/{id}/publish",
            post(handlers::graph_types::publish),
        )
        .route(
            "/graph-types/{id}/runtime",
            get(handlers::graph_types::get_runtime),
        )
        .route(
            "/graph-types/{id}/autocomplete",
            get(handlers::graph_types::get_autocomplete),
        )
        // Themes
        .route(
            "/themes",
            get(handlers::themes::list).post(handlers::themes::create),
        )
        .route(
            "/themes/{id}",
            get(handlers::themes::get).put(handlers::themes::update),
        )
        .route("/themes/{id}/bundle", get(handlers::themes::get_bundle))
        .route("/themes/{id}/publish", post(handlers::themes::publish))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

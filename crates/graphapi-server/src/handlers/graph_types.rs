//! Graph-type handlers, including the derived runtime and autocomplete
//! views.

use axum::extract::{Path, Query, State};
use axum::Json;

use graphapi_core::graph_type::{
    AutocompleteCatalog, CreateGraphTypeRequest, GraphTypeBundle, GraphTypeRuntime,
    UpdateGraphTypeRequest,
};
use graphapi_store::graph_types::{GraphTypeListResponse, GraphTypeRecord};

use crate::error::ApiError;
use crate::handlers::BundleQuery;
use crate::state::AppState;

/// `GET /graph-types`
pub async fn list(State(state): State<AppState>) -> Result<Json<GraphTypeListResponse>, ApiError> {
    Ok(Json(state.stores.graph_types.list()?))
}

/// `POST /graph-types`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateGraphTypeRequest>,
) -> Result<Json<GraphTypeRecord>, ApiError> {
    Ok(Json(state.stores.graph_types.create(&request)?))
}

/// `GET /graph-types/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(graph_type_id): Path<String>,
) -> Result<Json<GraphTypeRecord>, ApiError> {
    Ok(Json(state.stores.graph_types.get(&graph_type_id)?))
}

/// `PUT /graph-types/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(graph_type_id): Path<String>,
    Json(request): Json<UpdateGraphTypeRequest>,
) -> Result<Json<GraphTypeRecord>, ApiError> {
    Ok(Json(
        state.stores.graph_types.update(&graph_type_id, &request)?,
    ))
}

/// `GET /graph-types/{id}/bundle`
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(graph_type_id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<GraphTypeBundle>, ApiError> {
    Ok(Json(state.stores.graph_types.get_bundle(
        &graph_type_id,
        query.stage,
        query.version,
    )?))
}

/// `POST /graph-types/{id}/publish`
pub async fn publish(
    State(state): State<AppState>,
    Path(graph_type_id): Path<String>,
) -> Result<Json<GraphTypeBundle>, ApiError> {
    Ok(Json(state.stores.graph_types.publish(&graph_type_id)?))
}

/// `GET /graph-types/{id}/runtime`
pub async fn get_runtime(
    State(state): State<AppState>,
    Path(graph_type_id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<GraphTypeRuntime>, ApiError> {
    Ok(Json(state.stores.graph_types.get_runtime(
        &graph_type_id,
        query.stage,
        query.version,
    )?))
}

/// `GET /graph-types/{id}/autocomplete`
pub async fn get_autocomplete(
    State(state): State<AppState>,
    Path(graph_type_id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<AutocompleteCatalog>, ApiError> {
    Ok(Json(state.stores.graph_types.get_autocomplete(
        &graph_type_id,
        query.stage,
        query.version,
    )?))
}

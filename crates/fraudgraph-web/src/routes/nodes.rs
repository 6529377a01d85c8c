//! Node route handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use fraudgraph_core::schema::{NodeKind, Properties};
use fraudgraph_graph::queries::nodes;
use serde::Deserialize;
use serde_json::Value;

use super::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;

/// Default and maximum page size for entity listings.
pub(crate) const DEFAULT_LIST_LIMIT: usize = 100;
pub(crate) const MAX_LIST_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

impl ListParams {
    pub(crate) fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct RemovePropertiesRequest {
    pub properties: Vec<String>,
}

pub async fn create_node(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Result<Json<Properties>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let kind: NodeKind = kind.parse()?;
    let Json(props) = body?;
    let node = nodes::create_node(state.graph()?, kind, &props).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn list_nodes(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let kind: NodeKind = kind.parse()?;
    let Query(params) = params?;
    let items = nodes::list_nodes(state.graph()?, kind, params.limit()).await?;
    Ok(Json(Envelope::new("nodes", items)))
}

pub async fn get_node(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let kind: NodeKind = kind.parse()?;
    let node = nodes::get_node(state.graph()?, kind, &id).await?;
    Ok(Json(node))
}

pub async fn update_node(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    body: Result<Json<Properties>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let kind: NodeKind = kind.parse()?;
    let Json(props) = body?;
    let node = nodes::update_node(state.graph()?, kind, &id, &props).await?;
    Ok(Json(node))
}

pub async fn remove_properties(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    body: Result<Json<RemovePropertiesRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let kind: NodeKind = kind.parse()?;
    let Json(req) = body?;
    let node = nodes::remove_node_properties(state.graph()?, kind, &id, &req.properties).await?;
    Ok(Json(node))
}

pub async fn delete_node(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let kind: NodeKind = kind.parse()?;
    nodes::delete_node(state.graph()?, kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

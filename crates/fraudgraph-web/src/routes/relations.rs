//! Relation route handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use fraudgraph_core::schema::{Properties, RelationKind};
use fraudgraph_graph::queries::relations;
use serde::Deserialize;
use serde_json::{json, Value};

use super::nodes::ListParams;
use super::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RelationRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Deserialize)]
pub struct EndpointsRequest {
    pub from: String,
    pub to: String,
}

pub async fn create_relation(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Result<Json<RelationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let kind: RelationKind = kind.parse()?;
    let Json(req) = body?;
    let relation =
        relations::create_relation(state.graph()?, kind, &req.from, &req.to, &req.properties).await?;
    Ok((StatusCode::CREATED, Json(relation)))
}

pub async fn list_relations(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let kind: RelationKind = kind.parse()?;
    let Query(params) = params?;
    let items = relations::list_relations(state.graph()?, kind, params.limit()).await?;
    Ok(Json(Envelope::new("relations", items)))
}

pub async fn update_relation(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Result<Json<RelationRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let kind: RelationKind = kind.parse()?;
    let Json(req) = body?;
    let updated =
        relations::update_relation(state.graph()?, kind, &req.from, &req.to, &req.properties).await?;
    Ok(Json(Envelope::new("relations", updated)))
}

pub async fn delete_relation(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Result<Json<EndpointsRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let kind: RelationKind = kind.parse()?;
    let Json(req) = body?;
    let deleted = relations::delete_relation(state.graph()?, kind, &req.from, &req.to).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

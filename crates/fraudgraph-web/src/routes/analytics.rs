//! Analytics route handlers.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use fraudgraph_core::analytics::{
    AmountOutlier, AnomalousCustomer, AnomalyPolicyName, CascadeChain, ClusteringResult, FraudRing,
    HighRiskCustomer, RingPolicy, TimeOutlier,
};
use serde::Deserialize;

use super::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PolicyParams {
    pub policy: Option<String>,
}

/// GET /api/analytics/fraud-rings - Rings under the deduction policy.
pub async fn fraud_rings(State(state): State<AppState>) -> ApiResult<Json<Envelope<FraudRing>>> {
    let rings = state.analytics.fraud_rings(RingPolicy::Deduction).await?;
    Ok(Json(Envelope::new("rings", rings)))
}

/// GET /api/analytics/fraud-rings/{policy} - `robust` is an alias of `deduction`.
pub async fn fraud_rings_by_policy(
    State(state): State<AppState>,
    Path(policy): Path<String>,
) -> ApiResult<Json<Envelope<FraudRing>>> {
    let policy: RingPolicy = policy.parse()?;
    let rings = state.analytics.fraud_rings(policy).await?;
    Ok(Json(Envelope::new("rings", rings)))
}

pub async fn amount_outliers(State(state): State<AppState>) -> ApiResult<Json<Envelope<AmountOutlier>>> {
    let outliers = state.analytics.amount_outliers().await?;
    Ok(Json(Envelope::new("outliers", outliers)))
}

pub async fn time_outliers(State(state): State<AppState>) -> ApiResult<Json<Envelope<TimeOutlier>>> {
    let outliers = state.analytics.time_outliers().await?;
    Ok(Json(Envelope::new("outliers", outliers)))
}

pub async fn cascade_chains(State(state): State<AppState>) -> ApiResult<Json<Envelope<CascadeChain>>> {
    let chains = state.analytics.cascade_chains().await?;
    Ok(Json(Envelope::new("chains", chains)))
}

pub async fn high_risk_customers(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<HighRiskCustomer>>> {
    let customers = state.analytics.high_risk_customers().await?;
    Ok(Json(Envelope::new("customers", customers)))
}

/// GET /api/analytics/anomalous-customers?policy=strict|volatility
pub async fn anomalous_customers(
    State(state): State<AppState>,
    params: Result<Query<PolicyParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<AnomalousCustomer>>> {
    let Query(params) = params?;
    let policy = params
        .policy
        .as_deref()
        .map(str::parse::<AnomalyPolicyName>)
        .transpose()?;
    let customers = state.analytics.anomalous_customers(policy).await?;
    Ok(Json(Envelope::new("customers", customers)))
}

/// GET /api/analytics/kmeans-clustering - The clustering service result, as returned.
pub async fn kmeans_clustering(State(state): State<AppState>) -> ApiResult<Json<ClusteringResult>> {
    let result = state.analytics.kmeans_clustering().await?;
    Ok(Json(result))
}

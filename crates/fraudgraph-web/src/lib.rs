//! FraudGraph Web Server
//!
//! Axum-based JSON API for the fraud analytics and entity management.

pub mod error;
pub mod routes;
pub mod state;

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let analytics_routes = Router::new()
        .route("/fraud-rings", get(routes::analytics::fraud_rings))
        .route("/fraud-rings/{policy}", get(routes::analytics::fraud_rings_by_policy))
        .route("/amount-outliers", get(routes::analytics::amount_outliers))
        .route("/time-outliers", get(routes::analytics::time_outliers))
        .route("/cascade-chains", get(routes::analytics::cascade_chains))
        .route("/anomalous-customers", get(routes::analytics::anomalous_customers))
        .route("/high-risk-customers", get(routes::analytics::high_risk_customers))
        .route("/kmeans-clustering", get(routes::analytics::kmeans_clustering));

    let node_routes = Router::new()
        .route(
            "/{kind}",
            get(routes::nodes::list_nodes).post(routes::nodes::create_node),
        )
        .route(
            "/{kind}/{id}",
            get(routes::nodes::get_node)
                .patch(routes::nodes::update_node)
                .delete(routes::nodes::delete_node),
        )
        .route("/{kind}/{id}/properties", delete(routes::nodes::remove_properties));

    let relation_routes = Router::new().route(
        "/{kind}",
        get(routes::relations::list_relations)
            .post(routes::relations::create_relation)
            .patch(routes::relations::update_relation)
            .delete(routes::relations::delete_relation),
    );

    Router::new()
        .route("/", get(routes::service::index))
        .route("/health", get(routes::service::health))
        .nest("/api/analytics", analytics_routes)
        .nest("/api/nodes", node_routes)
        .nest("/api/relations", relation_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server until ctrl-c.
pub async fn run_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Web server listening on http://{}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

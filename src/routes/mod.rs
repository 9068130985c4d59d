use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

pub mod accounts;
pub mod platforms;
pub mod reviews;
pub mod state;
pub mod titles;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Platforms
        .route("/platforms", get(platforms::list).post(platforms::create))
        .route(
            "/platforms/:id",
            get(platforms::detail)
                .put(platforms::update)
                .delete(platforms::delete),
        )
        // Titles
        .route("/titles", get(titles::list).post(titles::create))
        .route(
            "/titles/:id",
            get(titles::detail).put(titles::update).delete(titles::delete),
        )
        .route(
            "/titles/:id/reviews",
            get(reviews::list_for_title).post(reviews::submit),
        )
        // Reviews
        .route("/reviews", get(reviews::list))
        .route(
            "/reviews/:id",
            get(reviews::detail)
                .put(reviews::update)
                .delete(reviews::delete),
        )
        // Accounts
        .route("/account/register", post(accounts::register))
        .route("/account/login", post(accounts::login))
        .route("/account/logout", post(accounts::logout))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::home))
        .route("/category/:id", get(handlers::category_page))
        .route("/news/:id", get(handlers::article_detail))
        .route("/news/external/:external_id", get(handlers::external_article_detail))
        .route("/api/hero", get(handlers::hero_api))
        .route("/api/weather", post(handlers::weather_proxy))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

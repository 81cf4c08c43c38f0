mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_handler, api::stats_handler),
    components(schemas(
        types::SearchForm,
        types::SearchResponse,
        types::StatsResponse,
        crate::search::SearchResult,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::stats_handler))
        .route("/search", post(api::search_handler))
        .route("/metrics", get(api::metrics_handler))
        .route("/api-docs/openapi.json", get(api::openapi_handler))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：8M
        .layer(RequestBodyLimitLayer::new(8 * 1024 * 1024))
        .with_state(state)
}

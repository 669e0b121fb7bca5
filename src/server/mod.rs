mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::compare_handler, api::search_handler, api::health_handler),
    components(schemas(types::CompareForm, types::CompareResponse, types::HealthResponse))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate_comparison", axum::routing::post(api::compare_handler))
        .route("/search", axum::routing::post(api::search_handler))
        .route("/api/health", axum::routing::get(api::health_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 请求体限制：64K
        .layer(RequestBodyLimitLayer::new(1024 * 64))
        .with_state(state)
}

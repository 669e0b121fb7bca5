use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use log::{error, info, warn};

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::compare::CompareRequest;

/// 概念对比检索
#[utoipa::path(
    post,
    path = "/generate_comparison",
    request_body = CompareForm,
    responses(
        (status = 200, body = CompareResponse),
        (status = 400, description = "top_k 小于 1"),
        (status = 500, description = "任意 track 失败"),
    )
)]
pub async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Json(form): Json<CompareForm>,
) -> Result<Json<CompareResponse>> {
    if form.top_k < 1 {
        return Err(AppError::bad_request("top_k 至少为 1"));
    }
    let req = CompareRequest::from(form);

    let start = Instant::now();
    let result = state.orchestrator.compare(&req).await.inspect_err(|e| {
        error!("对比请求失败: {:#}", e);
    })?;
    info!("对比完成，耗时 {}ms", start.elapsed().as_millis());

    let renderer = &state.orchestrator.context().renderer;
    let response = CompareResponse::new(result, |reason| {
        renderer.placeholder(reason).inspect_err(|e| warn!("占位图绘制失败: {}", e)).ok()
    });
    Ok(Json(response))
}

/// 与 `/generate_comparison` 相同
#[utoipa::path(
    post,
    path = "/search",
    request_body = CompareForm,
    responses(
        (status = 200, body = CompareResponse),
    )
)]
pub async fn search_handler(
    state: State<Arc<AppState>>,
    form: Json<CompareForm>,
) -> Result<Json<CompareResponse>> {
    compare_handler(state, form).await
}

/// 健康检查
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online".to_owned(),
        rows: state.orchestrator.context().index.len(),
    })
}

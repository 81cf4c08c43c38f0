use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_typed_multipart::TypedMultipart;
use log::info;
use tokio::task::block_in_place;
use utoipa::OpenApi;

use super::ApiDoc;
use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::config::truncate_results;
use crate::indexer::{decode, fetch_and_decode};
use crate::metrics;
use crate::search::SearchEngine;
use crate::utils::is_url;

/// 搜索一张图片
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "既没有上传文件也没有提供有效的 url，或上传的文件无法解码"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    TypedMultipart(data): TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    let image = match (data.file, data.url) {
        (Some(file), _) if !file.is_empty() => {
            info!("正在搜索上传图片 ({} 字节)", file.len());
            decode(file.to_vec())
                .await
                .map_err(|e| AppError::bad_request(format!("无法解码上传的图片: {}", e)))?
        }
        (_, Some(url)) if is_url(&url) => {
            info!("正在搜索 {}", url);
            fetch_and_decode(&state.source, &url, state.timeout).await?
        }
        _ => return Err(AppError::bad_request("需要上传图片文件或提供有效的 url")),
    };

    let mut result =
        block_in_place(|| SearchEngine::new(&state.db, &state.hash).search_image(&image))?;
    let total = result.len();
    truncate_results(&mut result, data.count.unwrap_or(state.search.count));

    let time = start.elapsed().as_millis() as u64;
    info!("找到 {} 个结果，耗时 {}ms", total, time);

    Ok(Json(SearchResponse { time, total, result }))
}

/// 获取数据库统计信息
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse { indexed_images: state.db.len() })
}

/// 导出 prometheus 指标
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::gather_text()?)
}

pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

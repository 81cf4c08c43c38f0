use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::Serialize;
use utoipa::ToSchema;

use crate::search::SearchResult;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Option<Bytes>,
    pub url: Option<String>,
    pub count: Option<usize>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 上传的图片文件，与 url 二选一，同时提供时使用文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: Option<String>,
    /// 图片的 http(s) 地址
    pub url: Option<String>,
    /// 返回的结果数量，0 表示返回全部
    pub count: Option<usize>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 截断前的结果数量
    pub total: usize,
    /// 按距离升序排列的搜索结果
    pub result: Vec<SearchResult>,
}

/// 数据库统计
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// 已索引的图片数量
    pub indexed_images: usize,
}

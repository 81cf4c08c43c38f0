use std::sync::Arc;
use std::time::Duration;

use crate::cli::server::ServerCommand;
use crate::config::SearchOptions;
use crate::database::Database;
use crate::fingerprint::FingerprintKind;
use crate::indexer::HttpSource;

/// 应用状态
pub struct AppState {
    /// 图片指纹数据库
    pub db: Database,
    /// 指纹算法，需要与建立数据库时一致
    pub hash: FingerprintKind,
    /// 下载搜索图片使用的客户端
    pub source: HttpSource,
    /// 搜索配置选项
    pub search: SearchOptions,
    /// 下载图片的超时时间
    pub timeout: Option<Duration>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        db: Database,
        hash: FingerprintKind,
        source: HttpSource,
        opts: &ServerCommand,
    ) -> Arc<Self> {
        Arc::new(AppState {
            db,
            hash,
            source,
            search: opts.search.clone(),
            timeout: opts.fetch.timeout(),
        })
    }
}

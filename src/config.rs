use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::fingerprint::FingerprintKind;

#[derive(Parser, Debug, Clone)]
pub struct FetchOptions {
    /// 单张图片的获取超时时间，单位为秒，0 表示不限制
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub timeout: u64,
}

impl FetchOptions {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// 构建 HTTP 客户端使用的超时，不限制时使用一个足够长的值
    pub fn client_timeout(&self) -> Duration {
        self.timeout().unwrap_or(Duration::from_secs(24 * 60 * 60))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 显示的结果数量，0 表示显示全部
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imgsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 数据库文件路径
    #[arg(short, long, global = true, default_value = "database.txt")]
    pub database: PathBuf,
    /// 图片指纹算法，建立和搜索数据库时必须一致
    #[arg(short = 'H', long, global = true, value_enum, default_value_t = FingerprintKind::Dhash)]
    pub hash: FingerprintKind,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 顺序扫描本地目录，建立数据库
    Index(IndexCommand),
    /// 从大型图片列表中等间距采样，并发下载并建立数据库
    Sample(SampleCommand),
    /// 从数据库中搜索相似图片
    Search(SearchCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

/// 截断搜索结果，`count` 为 0 时不截断
pub fn truncate_results<T>(results: &mut Vec<T>, count: usize) {
    if count != 0 {
        results.truncate(count);
    }
}

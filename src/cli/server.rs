use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::cli::index::build_database;
use crate::config::{FetchOptions, SearchOptions};
use crate::database::Database;
use crate::indexer::{DirectoryOptions, HttpSource};
use crate::{Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
    /// 数据库不存在时，先索引该目录下的图片
    #[arg(long, value_name = "DIR")]
    pub images: Option<PathBuf>,
}

impl ServerCommand {
    /// 加载数据库，数据库不存在时先索引 `--images` 指定的目录
    async fn load_database(&self, opts: &Opts) -> anyhow::Result<Database> {
        if !opts.database.exists() {
            let Some(images) = &self.images else {
                bail!("数据库 {} 不存在", opts.database.display());
            };
            warn!("数据库 {} 不存在，开始索引 {}", opts.database.display(), images.display());
            let options = DirectoryOptions::default();
            build_database(images, &opts.database, opts.hash, &options, false).await?;
        }

        block_in_place(|| Database::open(&opts.database))
            .with_context(|| format!("无法加载数据库 {}", opts.database.display()))
    }
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = self.load_database(opts).await?;
        let source = HttpSource::new(self.fetch.client_timeout())?;

        // 创建应用状态
        let state = server::AppState::new(db, opts.hash, source, self);

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

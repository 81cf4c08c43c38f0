use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{FetchOptions, Opts, SearchOptions, truncate_results};
use crate::database::Database;
use crate::indexer::{AutoSource, fetch_and_decode};
use crate::search::{SearchEngine, SearchResult};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 被搜索的图片路径或 URL
    pub image: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = block_in_place(|| Database::open(&opts.database))
            .with_context(|| format!("无法加载数据库 {}", opts.database.display()))?;

        let source = AutoSource::new(self.fetch.client_timeout())?;
        let image = fetch_and_decode(&source, &self.image, self.fetch.timeout())
            .await
            .with_context(|| format!("无法读取图片 {}", self.image))?;

        let mut result =
            block_in_place(|| SearchEngine::new(&db, &opts.hash).search_image(&image))?;
        info!("共找到 {} 个结果", result.len());

        truncate_results(&mut result, self.search.count);
        print_result(&result, self)
    }
}

fn print_result(result: &[SearchResult], opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for item in result {
                println!("{:.2}\t{}", item.distance, item.identifier);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

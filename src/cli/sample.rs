use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use log::{info, warn};

use crate::cli::SubCommandExtend;
use crate::config::{FetchOptions, Opts};
use crate::database::{DatabaseWriter, is_valid_identifier};
use crate::indexer::*;
use crate::utils::pb_style_speed;

#[derive(Parser, Debug, Clone)]
pub struct SampleCommand {
    /// 图片列表，`.json` 文件为包含 url 字段的对象数组，其他文件每行一个地址
    pub list: PathBuf,
    /// 采样数量
    #[arg(short = 'n', long, value_name = "N", default_value_t = 30000)]
    pub count: usize,
    /// 同时处理的最大图片数量
    #[arg(short = 'j', long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 追加到已有的数据库，而不是覆盖
    #[arg(short, long)]
    pub append: bool,
}

impl SubCommandExtend for SampleCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let references = load_references(&self.list)?;
        let total = references.len();

        let (selected, invalid): (Vec<_>, Vec<_>) = sample_references(&references, self.count)
            .into_iter()
            .partition(|reference| is_valid_identifier(reference));
        drop(references);
        for reference in &invalid {
            warn!("引用为空或包含空白字符，已跳过: {:?}", reference);
        }
        info!("从 {} 条引用中选出 {} 条", total, selected.len());

        let writer = if self.append {
            DatabaseWriter::append_to(&opts.database)
        } else {
            DatabaseWriter::create(&opts.database)
        }
        .with_context(|| format!("无法打开数据库 {}", opts.database.display()))?;

        let pb = ProgressBar::new(selected.len() as u64).with_style(pb_style_speed());
        let indexer = Indexer::new(AutoSource::new(self.fetch.client_timeout())?, opts.hash)
            .concurrency(self.concurrency)
            .timeout(self.fetch.timeout())
            .progress(pb.clone());

        let report = indexer.run(selected, shared_writer(writer)).await?;
        pb.finish_with_message(format!(
            "索引完成: 成功 {}，跳过 {}",
            report.indexed, report.dropped
        ));

        Ok(())
    }
}

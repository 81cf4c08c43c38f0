use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use indicatif::ProgressBar;
use tokio::sync::Mutex;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::database::DatabaseWriter;
use crate::fingerprint::FingerprintKind;
use crate::indexer::{DirectoryOptions, IndexReport, index_directory};
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct IndexCommand {
    /// 图片所在目录
    pub path: PathBuf,
    /// 只扫描这些后缀名的文件，多个后缀用逗号分隔，不填则尝试所有文件
    #[arg(short, long)]
    pub suffix: Option<String>,
    /// 只保存文件名，而不是完整路径
    #[arg(long)]
    pub basename: bool,
    /// 追加到已有的数据库，而不是覆盖
    #[arg(short, long)]
    pub append: bool,
}

impl SubCommandExtend for IndexCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let mut options = DirectoryOptions::default().basename(self.basename);
        if let Some(suffix) = &self.suffix {
            options = options.suffixes(suffix).context("无效的后缀名")?;
        }

        build_database(&self.path, &opts.database, opts.hash, &options, self.append).await?;
        Ok(())
    }
}

/// 扫描目录并把结果写入数据库文件
pub(crate) async fn build_database(
    root: &Path,
    database: &Path,
    hash: FingerprintKind,
    options: &DirectoryOptions,
    append: bool,
) -> Result<IndexReport> {
    // 先检查目录，避免清空了数据库却无事可做
    ensure!(root.is_dir(), "{} 不是一个目录", root.display());

    let writer = if append {
        DatabaseWriter::append_to(database)
    } else {
        DatabaseWriter::create(database)
    }
    .with_context(|| format!("无法打开数据库 {}", database.display()))?;
    let output = Mutex::new(writer);

    let pb = ProgressBar::no_length().with_style(pb_style());
    let report = index_directory(root, Arc::new(hash), &output, options, &pb).await?;
    pb.finish_with_message(format!("索引完成: 成功 {}，跳过 {}", report.indexed, report.dropped));

    Ok(report)
}

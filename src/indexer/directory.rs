use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use log::{info, warn};
use regex::Regex;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use super::{FileSource, IndexReport, IndexTask, process};
use crate::database::{DatabaseWriter, is_valid_identifier};
use crate::fingerprint::FingerprintProvider;

#[derive(Debug, Clone, Default)]
pub struct DirectoryOptions {
    /// 只处理扩展名匹配的文件，为空时处理所有文件
    pub suffix: Option<Regex>,
    /// 只使用文件名作为标识符，而不是完整路径
    pub basename: bool,
}

impl DirectoryOptions {
    /// 使用逗号分隔的扩展名列表过滤文件，不区分大小写，如 `jpg,png`
    pub fn suffixes(mut self, suffixes: &str) -> Result<Self, regex::Error> {
        let alternatives =
            suffixes.split(',').map(|s| regex::escape(s.trim())).collect::<Vec<_>>().join("|");
        self.suffix = Some(Regex::new(&format!("(?i)^({})$", alternatives))?);
        Ok(self)
    }

    pub fn basename(mut self, basename: bool) -> Self {
        self.basename = basename;
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        match &self.suffix {
            Some(re) => path.extension().is_some_and(|ext| re.is_match(&ext.to_string_lossy())),
            None => true,
        }
    }

    fn identifier(&self, path: &Path) -> String {
        if self.basename {
            if let Some(name) = path.file_name() {
                return name.to_string_lossy().into_owned();
            }
        }
        path.to_string_lossy().into_owned()
    }
}

/// 扫描目录，收集所有需要处理的普通文件，按文件名排序
fn scan_directory(root: &Path, options: &DirectoryOptions) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("扫描出错，已跳过: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && options.accepts(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// 顺序索引目录下的所有普通文件
///
/// 无法读取、解码或计算指纹的文件会被记录并跳过，不会中断扫描；只有写入输出失败时返回错误。
pub async fn index_directory<P, W>(
    root: impl AsRef<Path>,
    provider: Arc<P>,
    output: &Mutex<DatabaseWriter<W>>,
    options: &DirectoryOptions,
    pb: &ProgressBar,
) -> io::Result<IndexReport>
where
    P: FingerprintProvider + 'static,
    W: Write,
{
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} 不是一个目录", root.display()),
        ));
    }

    info!("开始扫描目录: {}", root.display());
    let files = scan_directory(root, options);
    info!("扫描完成，共 {} 个文件", files.len());

    let mut report = IndexReport::new(files.len());
    pb.set_length(files.len() as u64);

    for (position, path) in files.iter().enumerate() {
        let identifier = options.identifier(path);
        let reference = match path.to_str() {
            Some(reference) if is_valid_identifier(&identifier) => reference,
            _ => {
                warn!(
                    "[{}/{}] 路径包含无法保存的字符，已跳过: {}",
                    position + 1,
                    files.len(),
                    path.display()
                );
                report.dropped += 1;
                pb.inc(1);
                continue;
            }
        };

        let task = IndexTask::new(position, reference).with_identifier(identifier);
        let outcome = process(task, &FileSource, &provider, None, output).await?;
        report.record(&outcome, pb);
    }

    report.peak_in_flight = report.requested.min(1);
    info!(
        "目录索引完成: 成功 {}，跳过 {}，共 {}",
        report.indexed, report.dropped, report.requested
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_filter() {
        let options = DirectoryOptions::default().suffixes("jpg, png").unwrap();
        assert!(options.accepts(Path::new("a/b.jpg")));
        assert!(options.accepts(Path::new("a/b.PNG")));
        assert!(!options.accepts(Path::new("a/b.jpeg")));
        assert!(!options.accepts(Path::new("a/b")));
    }

    #[test]
    fn test_no_filter() {
        let options = DirectoryOptions::default();
        assert!(options.accepts(Path::new("a/b")));
        assert!(options.accepts(Path::new("a/b.txt")));
    }

    #[test]
    fn test_identifier() {
        let path = Path::new("images/cats/1.jpg");
        assert_eq!(DirectoryOptions::default().identifier(path), "images/cats/1.jpg");
        assert_eq!(DirectoryOptions::default().basename(true).identifier(path), "1.jpg");
    }
}

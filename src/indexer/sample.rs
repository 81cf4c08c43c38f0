use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;

/// 图片列表中的一条记录，只关心其中的 url 字段
#[derive(Debug, Deserialize)]
pub struct ReferenceRecord {
    pub url: String,
}

/// 从 `total` 个元素中等间距地挑选 `target` 个下标
///
/// 第 i 个下标为 `i * (total + total / target) / target`（向下取整），
/// 一旦超出范围就提前结束。结果是固定的、单调不减的，每次运行都相同。
pub fn sample_indices(total: usize, target: usize) -> Vec<usize> {
    if total == 0 || target == 0 {
        return vec![];
    }
    let target = if target > total {
        warn!("采样数量 {} 超过列表长度 {}，将使用全部 {} 条", target, total, total);
        total
    } else {
        target
    };

    // 使用 u128 避免大列表时乘法溢出
    let step = (total + total / target) as u128;
    (0..target as u128)
        .map(|i| (i * step / target as u128) as usize)
        .take_while(|&idx| idx < total)
        .collect()
}

/// 按 [`sample_indices`] 从列表中选出引用，保持原有顺序
pub fn sample_references<T: AsRef<str>>(references: &[T], target: usize) -> Vec<String> {
    sample_indices(references.len(), target)
        .into_iter()
        .map(|idx| references[idx].as_ref().to_owned())
        .collect()
}

/// 读取图片列表
///
/// `.json` 文件应为包含 `url` 字段的对象数组，其他文件每行一条引用，空行会被忽略
pub fn load_references(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    info!("正在读取图片列表: {}", path.display());

    let file = File::open(path).with_context(|| format!("无法打开 {}", path.display()))?;
    let reader = BufReader::new(file);

    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let references = if is_json {
        let records: Vec<ReferenceRecord> = serde_json::from_reader(reader)
            .with_context(|| format!("无法解析 {}", path.display()))?;
        records.into_iter().map(|record| record.url).collect()
    } else {
        let mut references = vec![];
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if !line.is_empty() {
                references.push(line.to_owned());
            }
        }
        references
    };

    info!("共读取 {} 条图片引用", references.len());
    Ok(references)
}

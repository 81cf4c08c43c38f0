use std::time::Instant;

use image::DynamicImage;
use log::debug;
use serde::Serialize;
use utoipa::ToSchema;

use crate::database::Database;
use crate::fingerprint::{Fingerprint, FingerprintProvider, HashError};
use crate::metrics;

/// 结果距离与当前最佳距离的最大比例
pub const PRUNE_RATIO: f64 = 1.5;

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SearchResult {
    /// 图片的 URL 或路径
    pub identifier: String,
    /// 与被搜索图片的距离，越小越相似
    pub distance: f64,
}

/// 在数据库上执行线性扫描的近似最近邻搜索
pub struct SearchEngine<'a, P: ?Sized> {
    db: &'a Database,
    provider: &'a P,
}

impl<'a, P: FingerprintProvider + ?Sized> SearchEngine<'a, P> {
    pub fn new(db: &'a Database, provider: &'a P) -> Self {
        Self { db, provider }
    }

    /// 搜索与 `query` 相似的图片，结果按距离升序排列
    ///
    /// 只扫描一遍数据库：距离小于当前最佳距离的记录总会被保留，其余记录只有在
    /// 不超过当前最佳距离的 1.5 倍时才保留。已经保留的记录不会因为之后出现更近的
    /// 结果而被移除，所以结果依赖于数据库中的顺序，并不是精确的 top-k。
    ///
    /// 结果数量不受限制，由调用者自行截断。
    pub fn search(&self, query: Fingerprint) -> Vec<SearchResult> {
        let start = Instant::now();
        let mut results = vec![];
        let mut best_diff = f64::MAX;

        for entry in self.db {
            let diff = self.provider.distance(query, entry.fingerprint);

            if diff < best_diff {
                best_diff = diff;
            } else if diff > best_diff * PRUNE_RATIO {
                continue;
            }

            results.push(SearchResult { identifier: entry.identifier.clone(), distance: diff });
        }

        // 稳定排序，距离相同时保持数据库中的顺序
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let elapsed = start.elapsed();
        debug!(
            "搜索完成: 扫描 {} 条，保留 {} 条，耗时 {:.2?}",
            self.db.len(),
            results.len(),
            elapsed
        );
        metrics::observe_search(elapsed, results.len());

        results
    }

    /// 计算图片指纹后搜索
    pub fn search_image(&self, image: &DynamicImage) -> Result<Vec<SearchResult>, HashError> {
        let query = self.provider.hash(image)?;
        debug!("查询指纹: {}", query);
        Ok(self.search(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Entry;
    use crate::fingerprint::DHash;

    /// 指纹本身就是距离的 10 倍，方便构造任意距离序列
    struct Linear;

    impl FingerprintProvider for Linear {
        fn hash(&self, _: &DynamicImage) -> Result<Fingerprint, HashError> {
            Ok(0)
        }

        fn distance(&self, a: Fingerprint, b: Fingerprint) -> f64 {
            (a as f64 - b as f64).abs() / 10.
        }
    }

    fn db_from(fingerprints: &[Fingerprint]) -> Database {
        fingerprints
            .iter()
            .enumerate()
            .map(|(i, &fp)| Entry::new(format!("img{}", i), fp))
            .collect()
    }

    fn distances(results: &[SearchResult]) -> Vec<f64> {
        results.iter().map(|r| r.distance).collect()
    }

    #[test]
    fn test_prune_sequence() {
        // 距离依次为 5, 0, 7.5, 7.6
        let db = db_from(&[50, 0, 75, 76]);
        let results = SearchEngine::new(&db, &Linear).search(0);
        assert_eq!(distances(&results), [0., 5.]);
        assert_eq!(results[0].identifier, "img1");
        assert_eq!(results[1].identifier, "img0");
    }

    #[test]
    fn test_prune_boundary_inclusive() {
        // 距离依次为 2, 3, 3.1：3 恰好等于 2 * 1.5，应被保留
        let db = db_from(&[20, 30, 31]);
        let results = SearchEngine::new(&db, &Linear).search(0);
        assert_eq!(distances(&results), [2., 3.]);
    }

    #[test]
    fn test_earlier_results_not_removed() {
        // 距离依次为 10, 14, 1：14 在当时满足阈值，之后出现的 1 不会把它移除
        let db = db_from(&[100, 140, 10]);
        let results = SearchEngine::new(&db, &Linear).search(0);
        assert_eq!(distances(&results), [1., 10., 14.]);
    }

    #[test]
    fn test_search_with_hamming() {
        // 汉明距离依次为 2, 50, 0
        let db = db_from(&[0b11, (1 << 50) - 1, 0]);
        let results = SearchEngine::new(&db, &DHash).search(0);
        assert_eq!(distances(&results), [0., 2.]);
    }

    #[test]
    fn test_search_order_dependent() {
        // 同样的距离 0, 2, 50，若最近的图片排在最前，则其余结果都会被过滤
        let db = db_from(&[0, 0b11, (1 << 50) - 1]);
        let results = SearchEngine::new(&db, &DHash).search(0);
        assert_eq!(distances(&results), [0.]);
    }

    #[test]
    fn test_stable_ties() {
        let db = db_from(&[30, 20, 20, 30]);
        let results = SearchEngine::new(&db, &Linear).search(0);
        let ids = results.iter().map(|r| r.identifier.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["img1", "img2", "img0", "img3"]);
    }

    #[test]
    fn test_search_deterministic() {
        let db = db_from(&[5, 17, 3, 99, 4, 3, 8]);
        let engine = SearchEngine::new(&db, &DHash);
        let first = engine.search(0x0F);
        for _ in 0..5 {
            assert_eq!(engine.search(0x0F), first);
        }
    }

    #[test]
    fn test_search_empty() {
        let db = Database::new();
        assert!(SearchEngine::new(&db, &DHash).search(42).is_empty());
    }
}

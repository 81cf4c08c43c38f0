use std::sync::LazyLock;
use std::time::Duration;

use prometheus::*;

use crate::indexer::TaskStage;

static METRIC_INDEX_TASKS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "imgsearch_index_tasks",
        "count of finished index tasks",
        &["outcome", "stage"]
    )
    .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "imgsearch_search_duration",
        "duration of the per-query search in seconds",
        exponential_buckets(0.0001, 2., 16).unwrap()
    )
    .unwrap()
});

static METRIC_SEARCH_RESULTS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "imgsearch_search_results",
        "number of results retained by the per-query search",
        exponential_buckets(1., 4., 10).unwrap()
    )
    .unwrap()
});

/// 记录一个成功写入数据库的任务
pub fn inc_indexed() {
    METRIC_INDEX_TASKS.with_label_values(&["indexed", "done"]).inc();
}

/// 记录一个在 `stage` 阶段失败的任务
pub fn inc_dropped(stage: TaskStage) {
    METRIC_INDEX_TASKS.with_label_values(&["dropped", stage.as_str()]).inc();
}

pub fn observe_search(duration: Duration, results: usize) {
    METRIC_SEARCH_DURATION.observe(duration.as_secs_f64());
    METRIC_SEARCH_RESULTS.observe(results as f64);
}

/// 以文本格式导出所有指标
pub fn gather_text() -> anyhow::Result<String> {
    let mut buffer = vec![];
    TextEncoder::new().encode(&gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

//! 将图片引用转换为数据库记录
//!
//! 两种模式写出的文件格式相同：
//! - [`index_directory`] 顺序扫描本地目录
//! - [`Indexer::run`] 并发获取一组引用（通常由 [`sample_references`] 从大列表中挑选）

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::ProgressBar;
use log::{debug, info, warn};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet, spawn_blocking};

mod directory;
mod sample;
mod source;
mod task;

pub use directory::*;
pub use sample::*;
pub use source::*;
pub use task::*;

use crate::database::{DatabaseWriter, Entry};
use crate::fingerprint::{Fingerprint, FingerprintProvider};
use crate::metrics;

/// 默认同时进行的任务数量
pub const DEFAULT_CONCURRENCY: usize = 64;
/// 默认的单次获取超时时间
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// 多个任务共享的输出，每次写入一行时独占
pub type SharedWriter<W> = Arc<Mutex<DatabaseWriter<W>>>;

pub fn shared_writer<W: Write>(writer: DatabaseWriter<W>) -> SharedWriter<W> {
    Arc::new(Mutex::new(writer))
}

/// 一次索引的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// 计划处理的引用数量
    pub requested: usize,
    /// 成功写入的记录数量
    pub indexed: usize,
    /// 因错误被跳过的数量
    pub dropped: usize,
    /// 同时进行的任务数量峰值
    pub peak_in_flight: usize,
}

impl IndexReport {
    pub fn new(requested: usize) -> Self {
        Self { requested, ..Default::default() }
    }

    /// 已经结束的任务数量
    pub fn finished(&self) -> usize {
        self.indexed + self.dropped
    }

    fn record(&mut self, outcome: &TaskOutcome, pb: &ProgressBar) {
        match outcome {
            TaskOutcome::Indexed { position, entry } => {
                self.indexed += 1;
                metrics::inc_indexed();
                info!(
                    "[{}/{}] 已索引 {} (指纹: {})",
                    position + 1,
                    self.requested,
                    entry.identifier,
                    entry.fingerprint
                );
                pb.set_message(entry.identifier.clone());
            }
            TaskOutcome::Dropped { position, reference, stage, reason } => {
                self.dropped += 1;
                metrics::inc_dropped(*stage);
                warn!(
                    "[{}/{}] 跳过 {} ({}): {}",
                    position + 1,
                    self.requested,
                    reference,
                    stage,
                    reason
                );
                pb.set_message(format!("跳过: {}", reference));
            }
        }
        pb.inc(1);
    }
}

/// 并发索引器
///
/// 计数器、信号量和输出都属于单次 [`Indexer::run`]，多个索引器可以同时运行互不影响。
pub struct Indexer<S, P> {
    source: Arc<S>,
    provider: Arc<P>,
    concurrency: usize,
    timeout: Option<Duration>,
    pb: ProgressBar,
}

impl<S, P> Indexer<S, P>
where
    S: ImageSource,
    P: FingerprintProvider + 'static,
{
    pub fn new(source: S, provider: P) -> Self {
        Self {
            source: Arc::new(source),
            provider: Arc::new(provider),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Some(DEFAULT_FETCH_TIMEOUT),
            pb: ProgressBar::hidden(),
        }
    }

    /// 设置最大并发任务数，至少为 1
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 设置单次获取的超时时间，`None` 表示不限制
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn progress(mut self, pb: ProgressBar) -> Self {
        self.pb = pb;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 并发索引所有引用，结果按完成顺序写入 `output`
    ///
    /// 单个任务的失败只会被记录并跳过，写入输出失败则会中止整个过程。
    pub async fn run<W>(
        &self,
        references: Vec<String>,
        output: SharedWriter<W>,
    ) -> io::Result<IndexReport>
    where
        W: Write + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut peak_in_flight = 0;
        let mut report = IndexReport::new(references.len());
        let mut tasks = JoinSet::new();

        info!("开始索引 {} 张图片，并发数 {}", references.len(), self.concurrency);
        self.pb.set_length(references.len() as u64);

        for (position, reference) in references.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await.map_err(io::Error::other)?;
            let guard = InFlight::enter(&in_flight);
            peak_in_flight = peak_in_flight.max(guard.current);

            let task = IndexTask::new(position, reference);
            let source = self.source.clone();
            let provider = self.provider.clone();
            let output = output.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                // 计数必须先于许可释放，任务 panic 时也一样
                let _permit = permit;
                let _guard = guard;
                process(task, &*source, &provider, timeout, &output).await
            });

            // 顺便收集已经结束的任务，避免结果堆积
            while let Some(joined) = tasks.try_join_next() {
                collect(joined, &mut report, &self.pb)?;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            collect(joined, &mut report, &self.pb)?;
        }

        report.peak_in_flight = peak_in_flight;
        info!(
            "索引完成: 成功 {}，跳过 {}，共 {}",
            report.indexed, report.dropped, report.requested
        );
        Ok(report)
    }
}

/// 正在进行的任务计数，离开作用域时减一
struct InFlight {
    counter: Arc<AtomicUsize>,
    current: usize,
}

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counter: counter.clone(), current }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn collect(
    joined: Result<io::Result<TaskOutcome>, JoinError>,
    report: &mut IndexReport,
    pb: &ProgressBar,
) -> io::Result<()> {
    match joined {
        Ok(outcome) => report.record(&outcome?, pb),
        // 任务 panic 时无法得知它所处的阶段，只能计为跳过
        Err(e) => {
            warn!("索引任务异常退出: {}", e);
            report.dropped += 1;
            pb.inc(1);
        }
    }
    Ok(())
}

/// 执行单个任务：获取 → 解码 → 计算指纹 → 写入
///
/// 前三个阶段的错误会使任务进入 `DroppedOnError`，写入失败则作为 I/O 错误返回。
pub(crate) async fn process<S, P, W>(
    mut task: IndexTask,
    source: &S,
    provider: &Arc<P>,
    timeout: Option<Duration>,
    output: &Mutex<DatabaseWriter<W>>,
) -> io::Result<TaskOutcome>
where
    S: ImageSource,
    P: FingerprintProvider + 'static,
    W: Write,
{
    let fingerprint = match compute_fingerprint(&mut task, source, provider, timeout).await {
        Ok(fingerprint) => fingerprint,
        Err(e) => return Ok(task.fail(e)),
    };

    task.advance();
    let entry = Entry::new(task.identifier.clone(), fingerprint);
    output.lock().await.append(&entry)?;
    debug!("[{}] 已写入 {}", task.position, entry);

    Ok(task.finish(entry))
}

async fn compute_fingerprint<S, P>(
    task: &mut IndexTask,
    source: &S,
    provider: &Arc<P>,
    timeout: Option<Duration>,
) -> Result<Fingerprint, IndexError>
where
    S: ImageSource,
    P: FingerprintProvider + 'static,
{
    task.advance();
    let bytes = fetch_with_timeout(source, &task.reference, timeout).await?;

    task.advance();
    let image = decode(bytes).await?;

    task.advance();
    let provider = provider.clone();
    Ok(spawn_blocking(move || provider.hash(&image)).await??)
}

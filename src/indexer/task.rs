use std::fmt;
use std::io;
use std::time::Duration;

use log::trace;
use thiserror::Error;
use tokio::task::JoinError;

use crate::database::Entry;
use crate::fingerprint::HashError;

/// 索引任务所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStage {
    Pending,
    Fetching,
    Decoding,
    Hashing,
    Writing,
    Done,
    DroppedOnError,
}

impl TaskStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Decoding => "decoding",
            Self::Hashing => "hashing",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::DroppedOnError => "dropped",
        }
    }

    /// 下一个正常阶段
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Fetching),
            Self::Fetching => Some(Self::Decoding),
            Self::Decoding => Some(Self::Hashing),
            Self::Hashing => Some(Self::Writing),
            Self::Writing => Some(Self::Done),
            Self::Done | Self::DroppedOnError => None,
        }
    }

    /// 只有获取、解码、计算指纹三个阶段的失败会丢弃任务
    pub fn can_fail(self) -> bool {
        matches!(self, Self::Fetching | Self::Decoding | Self::Hashing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::DroppedOnError)
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个索引任务的错误，只会导致该任务被丢弃
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("读取失败: {0}")]
    Io(#[from] io::Error),
    #[error("请求失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("服务器返回状态码 {0}，期望 200")]
    Status(u16),
    #[error("获取超时 ({0:?})")]
    Timeout(Duration),
    #[error("解码失败: {0}")]
    Decode(#[from] image::ImageError),
    #[error("计算指纹失败: {0}")]
    Hash(#[from] HashError),
    #[error("后台任务异常: {0}")]
    Join(#[from] JoinError),
}

/// 一张待索引的图片
#[derive(Debug)]
pub struct IndexTask {
    /// 在本次任务列表中的位置，用于显示进度
    pub position: usize,
    /// 获取图片使用的路径或 URL
    pub reference: String,
    /// 写入数据库的标识符
    pub identifier: String,
    stage: TaskStage,
}

impl IndexTask {
    pub fn new(position: usize, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self { position, identifier: reference.clone(), reference, stage: TaskStage::Pending }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn stage(&self) -> TaskStage {
        self.stage
    }

    /// 进入下一个阶段
    pub(crate) fn advance(&mut self) -> TaskStage {
        let next = self.stage.next().expect("terminal task cannot advance");
        trace!("[{}] {} -> {}: {}", self.position, self.stage, next, self.reference);
        self.stage = next;
        next
    }

    /// 完成写入，生成结果
    pub(crate) fn finish(mut self, entry: Entry) -> TaskOutcome {
        debug_assert_eq!(self.stage, TaskStage::Writing);
        self.advance();
        TaskOutcome::Indexed { position: self.position, entry }
    }

    /// 在当前阶段失败，任务直接进入 `DroppedOnError`
    pub(crate) fn fail(mut self, reason: IndexError) -> TaskOutcome {
        debug_assert!(self.stage.can_fail(), "task cannot fail at {}", self.stage);
        let stage = self.stage;
        self.stage = TaskStage::DroppedOnError;
        TaskOutcome::Dropped { position: self.position, reference: self.reference, stage, reason }
    }
}

/// 索引任务的最终结果
#[derive(Debug)]
pub enum TaskOutcome {
    Indexed {
        position: usize,
        entry: Entry,
    },
    Dropped {
        position: usize,
        reference: String,
        /// 失败时所处的阶段
        stage: TaskStage,
        reason: IndexError,
    },
}

impl TaskOutcome {
    pub fn position(&self) -> usize {
        match self {
            Self::Indexed { position, .. } | Self::Dropped { position, .. } => *position,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }

    /// 任务最终所处的阶段
    pub fn stage(&self) -> TaskStage {
        match self {
            Self::Indexed { .. } => TaskStage::Done,
            Self::Dropped { .. } => TaskStage::DroppedOnError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = TaskStage::Pending;
        let mut stages = vec![stage];
        while let Some(next) = stage.next() {
            stages.push(next);
            stage = next;
        }
        assert_eq!(
            stages,
            [
                TaskStage::Pending,
                TaskStage::Fetching,
                TaskStage::Decoding,
                TaskStage::Hashing,
                TaskStage::Writing,
                TaskStage::Done,
            ]
        );
        assert!(TaskStage::DroppedOnError.next().is_none());
    }

    #[test]
    fn test_task_success() {
        let mut task = IndexTask::new(3, "https://example.com/a.jpg");
        assert_eq!(task.stage(), TaskStage::Pending);
        for _ in 0..4 {
            task.advance();
        }
        assert_eq!(task.stage(), TaskStage::Writing);

        let outcome = task.finish(Entry::new("https://example.com/a.jpg", 1));
        assert!(outcome.is_indexed());
        assert_eq!(outcome.position(), 3);
        assert_eq!(outcome.stage(), TaskStage::Done);
    }

    #[test]
    fn test_task_dropped() {
        let mut task = IndexTask::new(0, "a.jpg").with_identifier("b.jpg");
        assert_eq!(task.identifier, "b.jpg");
        task.advance();
        task.advance();

        let outcome = task.fail(IndexError::Status(404));
        match outcome {
            TaskOutcome::Dropped { stage, reference, reason, .. } => {
                assert_eq!(stage, TaskStage::Decoding);
                assert_eq!(reference, "a.jpg");
                assert!(matches!(reason, IndexError::Status(404)));
            }
            _ => panic!("task should be dropped"),
        }
    }

    #[test]
    fn test_failable_stages() {
        assert!(!TaskStage::Pending.can_fail());
        assert!(TaskStage::Fetching.can_fail());
        assert!(TaskStage::Decoding.can_fail());
        assert!(TaskStage::Hashing.can_fail());
        assert!(!TaskStage::Writing.can_fail());
        assert!(TaskStage::Done.is_terminal());
        assert!(TaskStage::DroppedOnError.is_terminal());
    }
}

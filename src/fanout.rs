//! # 扇出执行器
//!
//! 按顺序对一组子资源（域名、监听器、站点等）执行同一操作。
//! 单项失败不会中断后续条目，全部执行完后以 [`AggregateError`] 汇总；
//! 取消信号在每个条目开始前检查，可选的条目间隔同样可以被取消。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{AggregateError, DeployError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 扇出执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// 成功的条目标识，按执行顺序
    pub succeeded: Vec<String>,
}

impl FanOutReport {
    /// 成功条目数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.succeeded.len()
    }

    /// 是否没有执行任何条目
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty()
    }
}

/// 顺序扇出执行器
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    interval: Option<Duration>,
}

impl FanOut {
    #[must_use]
    pub const fn new() -> Self {
        Self { interval: None }
    }

    /// 设置条目之间的等待时间（用于目标端限流）
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// 依次对每个条目执行 `op`
    ///
    /// 条目标识取自 `Display`。已取消时立即返回 [`DeployError::Cancelled`]，
    /// 剩余条目不再执行。
    pub async fn run<I, T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        items: I,
        mut op: F,
    ) -> Result<FanOutReport>
    where
        I: IntoIterator<Item = T>,
        T: Display,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut report = FanOutReport::default();
        let mut failures = AggregateError::new();

        for (index, item) in items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }

            if index > 0 {
                if let Some(interval) = self.interval {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(DeployError::Cancelled),
                        () = tokio::time::sleep(interval) => {}
                    }
                }
            }

            let item_id = item.to_string();
            ldebug!(
                "-",
                LogStage::FanOut,
                LogComponent::FanOut,
                "item_start",
                &format!("applying to {item_id}")
            );

            match op(item).await {
                Ok(()) => {
                    linfo!(
                        "-",
                        LogStage::FanOut,
                        LogComponent::FanOut,
                        "item_succeeded",
                        &format!("{item_id} updated")
                    );
                    report.succeeded.push(item_id);
                }
                Err(err) if err.is_cancelled() && cancel.is_cancelled() => {
                    return Err(DeployError::Cancelled);
                }
                Err(err) => {
                    lwarn!(
                        "-",
                        LogStage::FanOut,
                        LogComponent::FanOut,
                        "item_failed",
                        &format!("{item_id} failed: {err}")
                    );
                    failures.push(item_id, err);
                }
            }
        }

        match failures.into_option() {
            Some(aggregate) => Err(DeployError::Aggregate(aggregate)),
            None => Ok(report),
        }
    }
}

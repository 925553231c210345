//! # 聚合错误
//!
//! 扇出执行器在遍历子资源时收集的逐项失败。保留顺序与条目标识，
//! 调用方可以按条目检查失败原因，而不是去匹配拼接后的字符串。

use std::fmt;

use super::DeployError;

/// 单个子资源的失败记录
#[derive(Debug)]
pub struct ItemFailure {
    /// 子资源标识（域名、监听器 ID 等）
    pub item_id: String,
    /// 该子资源上的错误
    pub error: DeployError,
}

/// 有序的 (子资源, 错误) 列表
#[derive(Debug, Default)]
pub struct AggregateError {
    failures: Vec<ItemFailure>,
}

impl AggregateError {
    /// 创建空的聚合错误
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    /// 追加一条失败记录
    pub fn push(&mut self, item_id: impl Into<String>, error: DeployError) {
        self.failures.push(ItemFailure {
            item_id: item_id.into(),
            error,
        });
    }

    /// 全部失败记录
    #[must_use]
    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// 失败条目的标识，按发生顺序
    #[must_use]
    pub fn item_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.item_id.as_str()).collect()
    }

    /// 查找某个条目的错误
    #[must_use]
    pub fn error_for(&self, item_id: &str) -> Option<&DeployError> {
        self.failures
            .iter()
            .find(|f| f.item_id == item_id)
            .map(|f| &f.error)
    }

    /// 失败条目数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// 是否没有失败
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// 没有失败时返回 `None`，否则返回自身
    #[must_use]
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 每条失败一行
        for (idx, failure) in self.failures.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", failure.item_id, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}

impl IntoIterator for AggregateError {
    type Item = ItemFailure;
    type IntoIter = std::vec::IntoIter<ItemFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

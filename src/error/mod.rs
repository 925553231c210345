//! The unified error handling system for the deployment core.

// 1. Core Types
pub use aggregate::{AggregateError, ItemFailure};
pub use types::{DeployError, ErrorCategory};

/// A unified `Result` type for the entire crate.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, DeployError>;

// 2. Module declarations
pub mod aggregate;
pub mod macros;
pub mod types;

// 3. Context traits for annotating foreign errors.

/// 为外部调用的错误附加操作名，统一包装为 [`DeployError::Sdk`]
pub trait SdkContext<T> {
    /// 以固定操作名包装错误
    fn sdk_context(self, operation: &str) -> Result<T>;

    /// 以延迟构造的操作名包装错误
    fn with_sdk_context<C, F>(self, operation: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E> SdkContext<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn sdk_context(self, operation: &str) -> Result<T> {
        self.map_err(|e| DeployError::sdk(operation, e))
    }

    fn with_sdk_context<C, F>(self, operation: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| DeployError::sdk(operation(), e))
    }
}

/// 为任意错误附加配置上下文，统一包装为 [`DeployError::Config`]
pub trait ConfigContext<T> {
    /// 以延迟构造的说明包装为配置错误
    fn with_config_context<C, F>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E> ConfigContext<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn with_config_context<C, F>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| DeployError::config_with_source(message(), e))
    }
}

impl<T> ConfigContext<T> for Option<T> {
    fn with_config_context<C, F>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.ok_or_else(|| DeployError::config(message()))
    }
}

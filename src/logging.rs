//! # 日志配置模块
//!
//! 基于 `tracing` 的日志初始化，以及带阶段/组件字段的结构化日志宏。
//! 部署流程的每个阶段（配置、上传、域名解析、扇出）都通过
//! `linfo!` / `ldebug!` / `lwarn!` / `lerror!` 记录，方便按部署请求检索。

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 部署流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStage {
    /// 进程启动、注册 provider
    Startup,
    /// 物化配置、构造 provider
    Configure,
    /// 证书上传 / 替换
    Upload,
    /// 域名解析
    Resolve,
    /// 子资源扇出
    FanOut,
    /// 单次部署整体
    Deploy,
}

impl LogStage {
    /// 日志字段中的字符串表示
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Configure => "configure",
            Self::Upload => "upload",
            Self::Resolve => "resolve",
            Self::FanOut => "fan_out",
            Self::Deploy => "deploy",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogComponent {
    /// Provider 注册表
    Registry,
    /// 配置物化
    Materializer,
    /// 域名解析器
    Resolver,
    /// 证书管理（上传去重）
    CertMgr,
    /// 扇出执行器
    FanOut,
    /// 具体 provider
    Provider,
    /// 命令行入口
    Cli,
}

impl LogComponent {
    /// 日志字段中的字符串表示
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Materializer => "materializer",
            Self::Resolver => "resolver",
            Self::CertMgr => "certmgr",
            Self::FanOut => "fan_out",
            Self::Provider => "provider",
            Self::Cli => "cli",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则使用传入级别（默认 info），本 crate 自身放宽到 debug。
pub fn init_optimized_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let default_filter = format!("{level},certdeploy=debug,reqwest=warn,hyper=warn");

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    // 已经初始化过（例如测试中多次调用）时忽略
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            subscriber_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

/// 环境变量设置指南
pub fn print_logging_help() {
    println!("Logging configuration:");
    println!("  RUST_LOG=info                      # standard level");
    println!("  RUST_LOG=debug                     # debug level");
    println!("  RUST_LOG=certdeploy=trace          # verbose tracing for the deployment core");
    println!("  RUST_LOG=info,reqwest=debug        # include outbound HTTP client logs");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_and_component_render_as_snake_case() {
        assert_eq!(LogStage::FanOut.to_string(), "fan_out");
        assert_eq!(LogStage::Resolve.as_str(), "resolve");
        assert_eq!(LogComponent::CertMgr.to_string(), "certmgr");
    }

    #[test]
    fn init_is_idempotent() {
        init_optimized_logging(Some("debug"));
        init_optimized_logging(None);
        crate::linfo!(
            "test",
            LogStage::Startup,
            LogComponent::Cli,
            "logging_ready",
            "logging initialized twice without panicking"
        );
    }
}

//! # 内置 Provider
//!
//! 不依赖任何厂商 SDK 的两个通用部署目标：
//! - `webhook`：HTTP 回调
//! - `local`：写入本地文件

pub mod local;
pub mod webhook;

pub use local::{CertChainMode, LocalDeployer};
pub use webhook::WebhookDeployer;

use crate::config::ConfigMap;
use crate::deployer::Deployer;
use crate::error::Result;
use crate::registry::ProviderRegistry;

/// Webhook provider 标识
pub const WEBHOOK: &str = "webhook";
/// 本地文件 provider 标识
pub const LOCAL: &str = "local";

fn build_webhook(access: &ConfigMap, extended: &ConfigMap) -> Result<Box<dyn Deployer>> {
    Ok(Box::new(WebhookDeployer::new(access, extended)?))
}

fn build_local(access: &ConfigMap, extended: &ConfigMap) -> Result<Box<dyn Deployer>> {
    Ok(Box::new(LocalDeployer::new(access, extended)?))
}

/// 向注册表注册全部内置 provider
pub fn register_builtins(registry: &ProviderRegistry) {
    registry.must_register(WEBHOOK, build_webhook);
    registry.must_register(LOCAL, build_local);
}

//! # 配置管理模块
//!
//! - `materializer`：把不可信的 `ConfigMap` 物化为 provider 强类型配置
//! - `coerce`：宽松类型转换规则与 `serde_with` 字段适配器
//! - `accessor`：单键读取辅助
//! - `app_config`：命令行使用的 TOML 应用配置

mod accessor;
mod app_config;
pub mod coerce;
mod materializer;

pub use accessor::ConfigMapExt;
pub use app_config::{AppConfig, DeploymentConfig, LoggingConfig};
pub use coerce::Lenient;
pub use materializer::{populate, populate_merged, require_non_empty, require_positive};

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DeployError, Result};

/// 未经校验的键值配置（访问凭据 / 部署选项）
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// 配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "CERTDEPLOY_CONFIG_PATH";

/// 解析配置文件路径：显式路径 > `CERTDEPLOY_CONFIG_PATH` > `config/config.{RUST_ENV}.toml`
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载并校验配置文件
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config_file = resolve_config_path(explicit);

    if !config_file.exists() {
        return Err(DeployError::config(format!(
            "config file does not exist: {}",
            config_file.display()
        )));
    }

    let config_content = std::fs::read_to_string(&config_file).map_err(|e| {
        DeployError::config_with_source(
            format!("failed to read config file: {}", config_file.display()),
            e,
        )
    })?;

    let config = parse_config(&config_content)?;
    debug!(
        path = %config_file.display(),
        deployments = config.deployments.len(),
        "Loaded application config"
    );
    Ok(config)
}

/// 从 TOML 文本解析并校验配置
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

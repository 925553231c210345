//! # 应用配置结构定义

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigMap;
use crate::error::{DeployError, Result};

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 部署任务列表，按声明顺序依次执行
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（被 `RUST_LOG` 覆盖）
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 单个部署任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// 任务名称（唯一）
    pub name: String,
    /// provider 类型标识，例如 `webhook`、`local`
    pub provider: String,
    /// 证书 PEM 文件路径
    pub certificate: PathBuf,
    /// 私钥 PEM 文件路径
    pub private_key: PathBuf,
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 访问凭据（原样交给 provider 工厂）
    #[serde(default)]
    pub access: ConfigMap,
    /// 部署选项（原样交给 provider 工厂）
    #[serde(default)]
    pub extended: ConfigMap,
}

const fn default_enabled() -> bool {
    true
}

impl fmt::Display for DeploymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AppConfig {
    /// 校验配置有效性
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for deployment in &self.deployments {
            if deployment.name.trim().is_empty() {
                return Err(DeployError::config("deployment name must not be empty"));
            }
            if !seen.insert(deployment.name.as_str()) {
                return Err(DeployError::config(format!(
                    "duplicate deployment name: {}",
                    deployment.name
                )));
            }
            if deployment.provider.trim().is_empty() {
                return Err(DeployError::config(format!(
                    "deployment '{}' has no provider",
                    deployment.name
                )));
            }
            if deployment.certificate.as_os_str().is_empty()
                || deployment.private_key.as_os_str().is_empty()
            {
                return Err(DeployError::config(format!(
                    "deployment '{}' must set both certificate and private_key",
                    deployment.name
                )));
            }
        }

        Ok(())
    }

    /// 启用的部署任务
    pub fn enabled_deployments(&self) -> impl Iterator<Item = &DeploymentConfig> {
        self.deployments.iter().filter(|d| d.enabled)
    }

    /// 按名称查找部署任务
    #[must_use]
    pub fn deployment(&self, name: &str) -> Option<&DeploymentConfig> {
        self.deployments.iter().find(|d| d.name == name)
    }
}

//! # 错误类型定义

use thiserror::Error;

use super::aggregate::AggregateError;

/// 部署核心的主要错误类型
#[derive(Debug, Error)]
pub enum DeployError {
    /// 配置缺失或类型不匹配，在任何网络调用之前被检测到
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 注册表中不存在该 provider
    #[error("unknown provider: '{id}'")]
    UnknownProvider { id: String },

    /// 同一 provider 重复注册
    #[error("provider '{id}' is already registered")]
    DuplicateProvider { id: String },

    /// 域名解析没有得到任何候选
    #[error("no matching domains: {message}")]
    NoMatch { message: String },

    /// 外部 SDK / HTTP 调用失败
    #[error("failed to execute sdk request '{operation}': {source}")]
    Sdk {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// 引用的远程资源不存在
    #[error("{resource_type} '{identifier}' not found")]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    /// 上传后仍无法找回证书标识
    #[error("upload failed: {message}")]
    UploadFailed { message: String },

    /// 扇出执行中的部分失败
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// 调用方取消
    #[error("context canceled")]
    Cancelled,

    /// 证书或私钥 PEM 无法解析
    #[error("certificate error: {message}")]
    Certificate {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 序列化/反序列化错误
    #[error("serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建未知 provider 错误
    pub fn unknown_provider<T: Into<String>>(id: T) -> Self {
        Self::UnknownProvider { id: id.into() }
    }

    /// 创建重复注册错误
    pub fn duplicate_provider<T: Into<String>>(id: T) -> Self {
        Self::DuplicateProvider { id: id.into() }
    }

    /// 创建无匹配域名错误
    pub fn no_match<T: Into<String>>(message: T) -> Self {
        Self::NoMatch {
            message: message.into(),
        }
    }

    /// 包装 SDK 调用错误，附带操作名
    pub fn sdk<T: Into<String>, E: Into<anyhow::Error>>(operation: T, source: E) -> Self {
        Self::Sdk {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>, I: Into<String>>(resource_type: T, identifier: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// 创建上传失败错误
    pub fn upload_failed<T: Into<String>>(message: T) -> Self {
        Self::UploadFailed {
            message: message.into(),
        }
    }

    /// 创建证书错误
    pub fn certificate<T: Into<String>>(message: T) -> Self {
        Self::Certificate {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的证书错误
    pub fn certificate_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Certificate {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带说明的 IO 错误
    pub fn io<T: Into<String>>(message: T, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// 是否为取消错误
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// 是否为配置错误（不可重试，且一定发生在副作用之前）
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// 错误分类，用于日志和退出码
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. }
            | Self::UnknownProvider { .. }
            | Self::DuplicateProvider { .. }
            | Self::Certificate { .. } => ErrorCategory::Configuration,
            Self::NoMatch { .. } | Self::NotFound { .. } => ErrorCategory::Target,
            Self::Sdk { .. } | Self::UploadFailed { .. } | Self::Aggregate(_) => {
                ErrorCategory::Remote
            }
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Io { .. } | Self::Serialization { .. } => ErrorCategory::Internal,
        }
    }
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 调用方输入问题，无副作用
    Configuration,
    /// 目标端资源状态不满足（无匹配、不存在）
    Target,
    /// 远程调用失败，可能已有部分副作用
    Remote,
    /// 被取消
    Cancelled,
    /// 本地内部错误
    Internal,
}

// 自动转换常见错误类型
impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "file operation failed".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for DeployError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("failed to parse TOML", err)
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "failed to process JSON".to_string(),
            source: err.into(),
        }
    }
}

impl From<reqwest::Error> for DeployError {
    fn from(err: reqwest::Error) -> Self {
        Self::sdk("http.request", err)
    }
}

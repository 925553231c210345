//! # Certificate Deployment Core
//!
//! 把同一张证书统一部署到任意目标端的核心库：
//! provider 注册表、配置物化、域名匹配解析、证书去重上传与子资源扇出执行。

pub mod certmgr;
pub mod config;
pub mod deployer;
pub mod error;
pub mod fanout;
pub mod logging;
pub mod providers;
pub mod registry;
pub mod resolver;
pub mod tls;

// Re-export commonly used types
pub use config::{AppConfig, ConfigMap};
pub use deployer::{DeployResult, Deployer, deploy_with};
pub use error::{DeployError, Result};

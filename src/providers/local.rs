//! # 本地文件部署器
//!
//! 把证书与私钥写入本机路径，供 nginx 等进程直接读取。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info_span};

use crate::config::{ConfigMap, populate, require_non_empty};
use crate::deployer::{DeployResult, Deployer};
use crate::error::{DeployError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::tls::{split_chain, validate_private_key};
use crate::{config_error, linfo};

/// 证书文件内容
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertChainMode {
    /// 服务器证书 + 颁发者证书链
    #[default]
    FullChain,
    /// 仅服务器证书
    Server,
}

impl CertChainMode {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "fullchain" => Ok(Self::FullChain),
            "server" => Ok(Self::Server),
            other => Err(config_error!("unsupported certChainMode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LocalDeployConfig {
    #[serde(rename = "certPath")]
    cert_path: String,
    #[serde(rename = "keyPath")]
    key_path: String,
    #[serde(rename = "certChainMode")]
    cert_chain_mode: String,
    #[serde(rename = "issuerPath")]
    issuer_path: Option<String>,
}

/// 本地文件部署器
#[derive(Debug)]
pub struct LocalDeployer {
    cert_path: PathBuf,
    key_path: PathBuf,
    issuer_path: Option<PathBuf>,
    chain_mode: CertChainMode,
    logger: Span,
}

impl LocalDeployer {
    /// 由原始配置构造；本地部署没有访问配置
    pub fn new(_access: &ConfigMap, extended: &ConfigMap) -> Result<Self> {
        let config: LocalDeployConfig = populate(extended)?;
        require_non_empty("certPath", &config.cert_path)?;
        require_non_empty("keyPath", &config.key_path)?;

        Ok(Self {
            cert_path: PathBuf::from(config.cert_path.trim()),
            key_path: PathBuf::from(config.key_path.trim()),
            issuer_path: config
                .issuer_path
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            chain_mode: CertChainMode::parse(&config.cert_chain_mode)?,
            logger: info_span!("provider", id = super::LOCAL),
        })
    }

    async fn deploy_inner(
        &self,
        cancel: &CancellationToken,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<DeployResult> {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        let (server, issuer) = split_chain(cert_pem)?;
        validate_private_key(privkey_pem)?;

        let certificate = match self.chain_mode {
            CertChainMode::FullChain => format!("{server}{issuer}"),
            CertChainMode::Server => server,
        };

        let mut files = vec![
            ("certPath", self.cert_path.as_path(), certificate.as_str(), false),
            ("keyPath", self.key_path.as_path(), privkey_pem, true),
        ];
        if let Some(issuer_path) = &self.issuer_path {
            if !issuer.is_empty() {
                files.push(("issuerPath", issuer_path.as_path(), issuer.as_str(), false));
            }
        }

        // 全部暂存成功后才改名到目标路径
        let mut staged = Vec::with_capacity(files.len());
        for (_, target, content, private) in &files {
            match stage_file(target, content, *private).await {
                Ok(temp) => staged.push((temp, *target)),
                Err(err) => {
                    discard(&staged).await;
                    return Err(err);
                }
            }
        }
        if cancel.is_cancelled() {
            discard(&staged).await;
            return Err(DeployError::Cancelled);
        }
        for (temp, target) in &staged {
            tokio::fs::rename(temp, target).await.map_err(|e| {
                DeployError::io(format!("failed to move certificate into {}", target.display()), e)
            })?;
        }

        let mut data = ConfigMap::new();
        for (key, target, _, _) in &files {
            data.insert((*key).to_string(), path_value(target));
        }

        linfo!(
            "-",
            LogStage::Deploy,
            LogComponent::Provider,
            "files_written",
            &format!(
                "certificate written to {} and key to {}",
                self.cert_path.display(),
                self.key_path.display()
            )
        );
        Ok(DeployResult::with_data(data))
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.display().to_string())
}

/// 同目录下的临时文件名，保证改名不跨文件系统
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.certdeploy.tmp"))
}

async fn stage_file(target: &Path, content: &str, private: bool) -> Result<PathBuf> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DeployError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }

    let temp = staging_path(target);
    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| DeployError::io(format!("failed to write {}", temp.display()), e))?;

    if private {
        if let Err(err) = restrict_permissions(&temp).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err);
        }
    }
    Ok(temp)
}

async fn discard(staged: &[(PathBuf, &Path)]) {
    for (temp, _) in staged {
        let _ = tokio::fs::remove_file(temp).await;
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| {
            DeployError::io(format!("failed to restrict permissions of {}", path.display()), e)
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl Deployer for LocalDeployer {
    fn set_logger(&mut self, logger: Span) {
        self.logger = logger;
    }

    async fn deploy(
        &self,
        cancel: &CancellationToken,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<DeployResult> {
        self.deploy_inner(cancel, cert_pem, privkey_pem)
            .instrument(self.logger.clone())
            .await
    }
}

//! # 部署器契约
//!
//! 每个 provider 实例都实现 [`Deployer`]：接收完整的证书 PEM 与私钥 PEM，
//! 把证书应用到自己的目标端。实例按部署请求创建，用后即弃。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info_span};

use crate::config::ConfigMap;
use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::registry::{self, ProviderRegistry, ProviderTypeId};
use crate::{lerror, linfo};

/// 部署结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    /// provider 自定义的附加信息
    #[serde(default)]
    pub extended_data: ConfigMap,
}

impl DeployResult {
    /// 带附加信息的结果
    #[must_use]
    pub const fn with_data(extended_data: ConfigMap) -> Self {
        Self { extended_data }
    }
}

/// 部署器
#[async_trait]
pub trait Deployer: Send + Sync {
    /// 设置日志 span
    fn set_logger(&mut self, logger: Span);

    /// 把证书部署到目标端
    async fn deploy(
        &self,
        cancel: &CancellationToken,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<DeployResult>;
}

/// 使用全局注册表完成一次部署：查找工厂、构造部署器并执行
pub async fn deploy_with(
    provider: &ProviderTypeId,
    access: &ConfigMap,
    extended: &ConfigMap,
    cancel: &CancellationToken,
    cert_pem: &str,
    privkey_pem: &str,
) -> Result<DeployResult> {
    deploy_with_registry(
        registry::global(),
        provider,
        access,
        extended,
        cancel,
        cert_pem,
        privkey_pem,
    )
    .await
}

/// 同 [`deploy_with`]，使用指定的注册表
pub async fn deploy_with_registry(
    registry: &ProviderRegistry,
    provider: &ProviderTypeId,
    access: &ConfigMap,
    extended: &ConfigMap,
    cancel: &CancellationToken,
    cert_pem: &str,
    privkey_pem: &str,
) -> Result<DeployResult> {
    let span = info_span!("deploy", provider = %provider);

    async {
        let factory = registry.get(provider)?;
        let mut deployer = factory(access, extended).inspect_err(|err| {
            lerror!(
                "-",
                LogStage::Configure,
                LogComponent::Provider,
                "build_failed",
                &format!("failed to build provider '{provider}': {err}")
            );
        })?;
        deployer.set_logger(Span::current());

        linfo!(
            "-",
            LogStage::Configure,
            LogComponent::Provider,
            "configured",
            &format!("provider '{provider}' configured")
        );

        match deployer.deploy(cancel, cert_pem, privkey_pem).await {
            Ok(result) => {
                linfo!(
                    "-",
                    LogStage::Deploy,
                    LogComponent::Provider,
                    "done",
                    &format!("provider '{provider}' deployment finished")
                );
                Ok(result)
            }
            Err(err) => {
                lerror!(
                    "-",
                    LogStage::Deploy,
                    LogComponent::Provider,
                    "failed",
                    &format!("provider '{provider}' deployment failed: {err}")
                );
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use serde_json::json;

    struct EchoDeployer {
        target: String,
    }

    #[async_trait]
    impl Deployer for EchoDeployer {
        fn set_logger(&mut self, _logger: Span) {}

        async fn deploy(
            &self,
            cancel: &CancellationToken,
            cert_pem: &str,
            _privkey_pem: &str,
        ) -> Result<DeployResult> {
            if cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }
            let mut data = ConfigMap::new();
            data.insert("target".to_string(), json!(self.target));
            data.insert("bytes".to_string(), json!(cert_pem.len()));
            Ok(DeployResult::with_data(data))
        }
    }

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry
            .register("echo", |access: &ConfigMap, _: &ConfigMap| {
                let target = access
                    .get("target")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                crate::config::require_non_empty("target", target)?;
                Ok(Box::new(EchoDeployer {
                    target: target.to_string(),
                }) as Box<dyn Deployer>)
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn deploys_through_registry() {
        let mut access = ConfigMap::new();
        access.insert("target".to_string(), json!("edge-1"));
        let cancel = CancellationToken::new();

        let result = deploy_with_registry(
            &registry(),
            "echo",
            &access,
            &ConfigMap::new(),
            &cancel,
            "CERT",
            "KEY",
        )
        .await
        .unwrap();
        assert_eq!(result.extended_data["target"], json!("edge-1"));
        assert_eq!(result.extended_data["bytes"], json!(4));
    }

    #[tokio::test]
    async fn factory_validation_error_surfaces() {
        let cancel = CancellationToken::new();
        let err = deploy_with_registry(
            &registry(),
            "echo",
            &ConfigMap::new(),
            &ConfigMap::new(),
            &cancel,
            "CERT",
            "KEY",
        )
        .await
        .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn unknown_provider_fails_before_deploying() {
        let cancel = CancellationToken::new();
        let err = deploy_with_registry(
            &registry(),
            "unknown-xyz",
            &ConfigMap::new(),
            &ConfigMap::new(),
            &cancel,
            "CERT",
            "KEY",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::UnknownProvider { .. }));
    }
}

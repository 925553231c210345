//! # Provider 注册表
//!
//! 按字符串标识保存部署器工厂。内置 provider 通过 [`register_all_builtins`]
//! 显式注册，不依赖模块加载时的副作用。

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Once, PoisonError, RwLock};

use crate::config::ConfigMap;
use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};

/// 目标端类型标识，例如 `"webhook"`、`"aliyun-esa"`
pub type ProviderTypeId = str;

/// 由 (access, extended) 配置构造部署器
pub type DeployerFactory =
    Arc<dyn Fn(&ConfigMap, &ConfigMap) -> Result<Box<dyn Deployer>> + Send + Sync>;

/// provider 类型到工厂函数的映射
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, DeployerFactory>>,
}

impl ProviderRegistry {
    /// 创建独立的空注册表
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工厂；同一标识只能注册一次
    pub fn register<F>(&self, id: &ProviderTypeId, factory: F) -> Result<()>
    where
        F: Fn(&ConfigMap, &ConfigMap) -> Result<Box<dyn Deployer>> + Send + Sync + 'static,
    {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(id) {
            return Err(DeployError::duplicate_provider(id));
        }
        factories.insert(id.to_string(), Arc::new(factory));

        ldebug!(
            "-",
            LogStage::Startup,
            LogComponent::Registry,
            "provider_registered",
            &format!("registered provider '{id}'")
        );
        Ok(())
    }

    /// 注册失败时 panic，只用于启动阶段的内置 provider
    pub fn must_register<F>(&self, id: &ProviderTypeId, factory: F)
    where
        F: Fn(&ConfigMap, &ConfigMap) -> Result<Box<dyn Deployer>> + Send + Sync + 'static,
    {
        if let Err(err) = self.register(id, factory) {
            panic!("{err}");
        }
    }

    /// 查找工厂，未注册时返回 `UnknownProvider`
    pub fn get(&self, id: &ProviderTypeId) -> Result<DeployerFactory> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| DeployError::unknown_provider(id))
    }

    /// 是否已注册
    #[must_use]
    pub fn contains(&self, id: &ProviderTypeId) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// 已注册的标识，按字典序
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort_unstable();
        ids
    }
}

static GLOBAL_REGISTRY: LazyLock<ProviderRegistry> = LazyLock::new(ProviderRegistry::new);
static BUILTINS: Once = Once::new();

/// 进程级注册表
pub fn global() -> &'static ProviderRegistry {
    &GLOBAL_REGISTRY
}

/// 注册到全局注册表
pub fn register<F>(id: &ProviderTypeId, factory: F) -> Result<()>
where
    F: Fn(&ConfigMap, &ConfigMap) -> Result<Box<dyn Deployer>> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY.register(id, factory)
}

/// 注册到全局注册表，失败时 panic
pub fn must_register<F>(id: &ProviderTypeId, factory: F)
where
    F: Fn(&ConfigMap, &ConfigMap) -> Result<Box<dyn Deployer>> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY.must_register(id, factory);
}

/// 从全局注册表查找工厂
pub fn get_factory(id: &ProviderTypeId) -> Result<DeployerFactory> {
    GLOBAL_REGISTRY.get(id)
}

/// 向全局注册表注册全部内置 provider，可重复调用
pub fn register_all_builtins() {
    BUILTINS.call_once(|| {
        crate::providers::register_builtins(&GLOBAL_REGISTRY);
        linfo!(
            "-",
            LogStage::Startup,
            LogComponent::Registry,
            "builtins_registered",
            &format!("built-in providers: {:?}", GLOBAL_REGISTRY.ids())
        );
    });
}

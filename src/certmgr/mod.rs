//! # 证书管理能力
//!
//! 目标端拥有独立"证书库"时（例如 CDN 域名引用已上传证书的 ID），
//! provider 通过本模块把证书上传或原地替换。
//!
//! - `dedup`：先查后写的去重上传协议，基于 [`CertificateStore`] 原语
//! - `memory`：内存证书库，作为参考实现

pub mod dedup;
pub mod memory;

pub use dedup::{
    CertificateStore, CreateCertificate, DedupKey, DedupMode, DedupUploader, StorePage,
    StoredCertificate,
};
pub use memory::MemoryCertificateStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::config::ConfigMap;
use crate::error::Result;

/// 上传结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    /// 目标端分配的证书 ID
    pub cert_id: String,
    /// 证书名称
    pub cert_name: String,
    /// 其它附加信息
    #[serde(default)]
    pub extended_data: ConfigMap,
}

/// 替换结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperateResult {
    /// 附加信息
    #[serde(default)]
    pub extended_data: ConfigMap,
}

/// 证书管理能力
#[async_trait]
pub trait CertificateManager: Send + Sync {
    /// 设置日志 span
    fn set_logger(&mut self, logger: Span);

    /// 上传证书；内容已存在时直接返回已有 ID
    async fn upload(
        &self,
        cancel: &CancellationToken,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<UploadResult>;

    /// 按 ID 或名称原地替换证书内容，保持标识不变
    async fn replace(
        &self,
        cancel: &CancellationToken,
        cert_id_or_name: &str,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<OperateResult>;
}

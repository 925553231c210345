//! # 去重上传协议
//!
//! `upload` 先分页检索目标端证书库，按规范化后的 PEM 内容比较；
//! 命中时直接返回已有 ID，不产生任何写操作。未命中时创建证书，
//! 若创建接口没有同步返回 ID，则再检索一次找回目标端分配的标识。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info_span};

use super::{CertificateManager, OperateResult, UploadResult};
use crate::config::ConfigMap;
use crate::error::{DeployError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::tls::normalize_pem;
use crate::{ldebug, linfo};

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// 检索翻页上限，远端忽略页码且不报告总数时终止检索
pub const MAX_SEARCH_PAGES: u32 = 10_000;

/// 目标端证书库中的一条记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCertificate {
    /// 证书 ID
    pub id: String,
    /// 证书名称
    pub name: String,
    /// 描述，替换时需要原样回传
    pub description: Option<String>,
    /// 证书 PEM
    pub certificate_pem: String,
    /// 私钥 PEM；目标端不返回私钥时为 `None`
    pub private_key_pem: Option<String>,
}

/// 一页证书
#[derive(Debug, Clone, Default)]
pub struct StorePage {
    /// 本页证书
    pub items: Vec<StoredCertificate>,
    /// 远端报告的总数（未知时为 `None`）
    pub total: Option<u64>,
}

/// 创建证书请求
#[derive(Debug, Clone)]
pub struct CreateCertificate<'a> {
    /// 证书名称
    pub name: &'a str,
    /// 证书 PEM
    pub certificate_pem: &'a str,
    /// 私钥 PEM
    pub private_key_pem: &'a str,
}

/// 目标端证书库原语，由具体 provider 实现
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// 读取一页证书（页码从 1 开始）
    async fn list_page(
        &self,
        cancel: &CancellationToken,
        page_number: u32,
        page_size: u32,
    ) -> Result<StorePage>;

    /// 创建证书；若目标端同步返回了 ID 则一并返回
    async fn create(
        &self,
        cancel: &CancellationToken,
        request: CreateCertificate<'_>,
    ) -> Result<Option<String>>;

    /// 按 ID 或名称查询
    async fn get(
        &self,
        cancel: &CancellationToken,
        id_or_name: &str,
    ) -> Result<Option<StoredCertificate>>;

    /// 原地更新证书内容
    async fn update(
        &self,
        cancel: &CancellationToken,
        existing: &StoredCertificate,
        certificate_pem: &str,
        private_key_pem: &str,
    ) -> Result<()>;
}

#[async_trait]
impl<S> CertificateStore for Arc<S>
where
    S: CertificateStore + ?Sized,
{
    async fn list_page(
        &self,
        cancel: &CancellationToken,
        page_number: u32,
        page_size: u32,
    ) -> Result<StorePage> {
        (**self).list_page(cancel, page_number, page_size).await
    }

    async fn create(
        &self,
        cancel: &CancellationToken,
        request: CreateCertificate<'_>,
    ) -> Result<Option<String>> {
        (**self).create(cancel, request).await
    }

    async fn get(
        &self,
        cancel: &CancellationToken,
        id_or_name: &str,
    ) -> Result<Option<StoredCertificate>> {
        (**self).get(cancel, id_or_name).await
    }

    async fn update(
        &self,
        cancel: &CancellationToken,
        existing: &StoredCertificate,
        certificate_pem: &str,
        private_key_pem: &str,
    ) -> Result<()> {
        (**self)
            .update(cancel, existing, certificate_pem, private_key_pem)
            .await
    }
}

/// 去重比较方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupMode {
    /// 证书与私钥都一致才视为重复
    #[default]
    CertificateAndKey,
    /// 目标端不返回私钥，只比较证书
    CertificateOnly,
}

/// 去重键：去除空白后的证书 PEM 与私钥 PEM
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    certificate: String,
    private_key: String,
}

impl DedupKey {
    /// 由证书与私钥构造
    #[must_use]
    pub fn new(cert_pem: &str, privkey_pem: &str) -> Self {
        Self {
            certificate: normalize_pem(cert_pem),
            private_key: normalize_pem(privkey_pem),
        }
    }

    /// 拼接后的规范化内容
    #[must_use]
    pub fn as_concatenated(&self) -> String {
        format!("{}{}", self.certificate, self.private_key)
    }

    /// 判断目标端记录是否与本键一致
    #[must_use]
    pub fn matches(&self, stored: &StoredCertificate, mode: DedupMode) -> bool {
        if normalize_pem(&stored.certificate_pem) != self.certificate {
            return false;
        }
        match mode {
            DedupMode::CertificateOnly => true,
            DedupMode::CertificateAndKey => stored
                .private_key_pem
                .as_deref()
                .is_some_and(|key| normalize_pem(key) == self.private_key),
        }
    }
}

/// 基于证书库原语的去重上传器
pub struct DedupUploader<S> {
    store: S,
    page_size: u32,
    mode: DedupMode,
    name_prefix: String,
    logger: Span,
}

impl<S> DedupUploader<S>
where
    S: CertificateStore,
{
    /// 创建上传器
    pub fn new(store: S) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
            mode: DedupMode::default(),
            name_prefix: "certdeploy".to_string(),
            logger: info_span!("certmgr"),
        }
    }

    /// 设置分页大小（最小为 1）
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// 设置去重比较方式
    #[must_use]
    pub const fn with_mode(mut self, mode: DedupMode) -> Self {
        self.mode = mode;
        self
    }

    /// 设置新建证书名称前缀
    #[must_use]
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// 底层证书库
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// 分页检索与去重键一致的证书
    pub async fn find_existing(
        &self,
        cancel: &CancellationToken,
        key: &DedupKey,
    ) -> Result<Option<StoredCertificate>> {
        let mut page_number = 1;
        let mut seen: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }

            let page = self
                .store
                .list_page(cancel, page_number, self.page_size)
                .await?;
            let fetched = page.items.len();
            seen += fetched as u64;

            ldebug!(
                "-",
                LogStage::Upload,
                LogComponent::CertMgr,
                "list_certificates_page",
                &format!("page {page_number} returned {fetched} certificate(s)")
            );

            if let Some(found) = page.items.into_iter().find(|item| key.matches(item, self.mode)) {
                return Ok(Some(found));
            }

            if fetched < self.page_size as usize {
                break;
            }
            if page.total.is_some_and(|total| seen >= total) {
                break;
            }
            if page_number >= MAX_SEARCH_PAGES {
                return Err(crate::sdk_error!(
                    "certificate.list",
                    "search gave up after {} pages without reaching the end of the listing",
                    MAX_SEARCH_PAGES
                ));
            }
            page_number += 1;
        }

        Ok(None)
    }

    async fn upload_inner(
        &self,
        cancel: &CancellationToken,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<UploadResult> {
        let key = DedupKey::new(cert_pem, privkey_pem);

        if let Some(existing) = self.find_existing(cancel, &key).await? {
            linfo!(
                "-",
                LogStage::Upload,
                LogComponent::CertMgr,
                "certificate_exists",
                &format!("certificate already uploaded, reusing id {}", existing.id)
            );
            return Ok(found_result(existing, true));
        }

        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        let cert_name = format!(
            "{}-{}",
            self.name_prefix,
            chrono::Utc::now().timestamp_millis()
        );
        let assigned = self
            .store
            .create(
                cancel,
                CreateCertificate {
                    name: &cert_name,
                    certificate_pem: cert_pem,
                    private_key_pem: privkey_pem,
                },
            )
            .await?;

        if let Some(cert_id) = assigned.filter(|id| !id.is_empty()) {
            linfo!(
                "-",
                LogStage::Upload,
                LogComponent::CertMgr,
                "certificate_uploaded",
                &format!("certificate uploaded as {cert_name} (id {cert_id})")
            );
            return Ok(UploadResult {
                cert_id,
                cert_name,
                extended_data: ConfigMap::new(),
            });
        }

        // 创建接口未同步返回 ID，再检索一次
        match self.find_existing(cancel, &key).await? {
            Some(created) => {
                linfo!(
                    "-",
                    LogStage::Upload,
                    LogComponent::CertMgr,
                    "certificate_uploaded",
                    &format!("certificate uploaded, recovered id {}", created.id)
                );
                Ok(found_result(created, false))
            }
            None => Err(DeployError::upload_failed(format!(
                "certificate '{cert_name}' was created but could not be found afterwards"
            ))),
        }
    }

    async fn replace_inner(
        &self,
        cancel: &CancellationToken,
        cert_id_or_name: &str,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<OperateResult> {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        let existing = self
            .store
            .get(cancel, cert_id_or_name)
            .await?
            .ok_or_else(|| DeployError::not_found("certificate", cert_id_or_name))?;

        self.store
            .update(cancel, &existing, cert_pem, privkey_pem)
            .await?;

        linfo!(
            "-",
            LogStage::Upload,
            LogComponent::CertMgr,
            "certificate_replaced",
            &format!("certificate {} replaced in place", existing.id)
        );

        let mut extended_data = ConfigMap::new();
        extended_data.insert("certId".to_string(), Value::String(existing.id));
        extended_data.insert("certName".to_string(), Value::String(existing.name));
        Ok(OperateResult { extended_data })
    }
}

fn found_result(stored: StoredCertificate, reused: bool) -> UploadResult {
    let mut extended_data = ConfigMap::new();
    extended_data.insert("reused".to_string(), Value::Bool(reused));
    UploadResult {
        cert_id: stored.id,
        cert_name: stored.name,
        extended_data,
    }
}

#[async_trait]
impl<S> CertificateManager for DedupUploader<S>
where
    S: CertificateStore,
{
    fn set_logger(&mut self, logger: Span) {
        self.logger = logger;
    }

    async fn upload(
        &self,
        cancel: &CancellationToken,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<UploadResult> {
        self.upload_inner(cancel, cert_pem, privkey_pem)
            .instrument(self.logger.clone())
            .await
    }

    async fn replace(
        &self,
        cancel: &CancellationToken,
        cert_id_or_name: &str,
        cert_pem: &str,
        privkey_pem: &str,
    ) -> Result<OperateResult> {
        self.replace_inner(cancel, cert_id_or_name, cert_pem, privkey_pem)
            .instrument(self.logger.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(cert: &str, key: Option<&str>) -> StoredCertificate {
        StoredCertificate {
            id: "1".to_string(),
            name: "n".to_string(),
            description: None,
            certificate_pem: cert.to_string(),
            private_key_pem: key.map(str::to_string),
        }
    }

    #[test]
    fn dedup_key_ignores_whitespace() {
        let a = DedupKey::new("-----BEGIN X-----\nAAA\n-----END X-----\n", "KEY\n");
        let b = DedupKey::new("-----BEGIN X-----\r\nAAA\r\n-----END X-----\n\n\n", " KEY ");
        assert_eq!(a, b);
        assert_eq!(a.as_concatenated(), "-----BEGINX-----AAA-----ENDX-----KEY");
    }

    #[test]
    fn matches_respects_mode() {
        let key = DedupKey::new("CERT", "KEY");
        assert!(key.matches(&stored("CERT\n", Some("KEY\n")), DedupMode::CertificateAndKey));
        assert!(!key.matches(&stored("CERT", Some("OTHER")), DedupMode::CertificateAndKey));
        assert!(!key.matches(&stored("CERT", None), DedupMode::CertificateAndKey));
        assert!(key.matches(&stored("CERT", None), DedupMode::CertificateOnly));
        assert!(!key.matches(&stored("OTHER", Some("KEY")), DedupMode::CertificateOnly));
    }
}

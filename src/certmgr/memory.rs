//! # 内存证书库
//!
//! [`CertificateStore`] 的内存实现，记录各原语的调用次数。
//! 可以模拟"创建接口不返回 ID"和"列表不返回私钥"两类目标端行为。

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::dedup::{CertificateStore, CreateCertificate, StorePage, StoredCertificate};
use crate::error::{DeployError, Result};

/// 内存证书库
#[derive(Debug, Default)]
pub struct MemoryCertificateStore {
    items: Mutex<Vec<StoredCertificate>>,
    next_id: AtomicUsize,
    omits_create_id: bool,
    hides_private_keys: bool,
    create_calls: AtomicUsize,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MemoryCertificateStore {
    /// 创建空证书库，创建接口同步返回 ID
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建接口不返回 ID，需要调用方再次检索
    #[must_use]
    pub const fn without_create_id(mut self) -> Self {
        self.omits_create_id = true;
        self
    }

    /// 列表与查询不返回私钥
    #[must_use]
    pub const fn hiding_private_keys(mut self) -> Self {
        self.hides_private_keys = true;
        self
    }

    /// 预置一条证书记录
    #[must_use]
    pub fn with_certificate(self, certificate: StoredCertificate) -> Self {
        self.lock().push(certificate);
        self
    }

    /// `create` 调用次数
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// `list_page` 调用次数
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// `update` 调用次数
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// 当前全部记录（含私钥）
    pub fn snapshot(&self) -> Vec<StoredCertificate> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredCertificate>> {
        // 持锁期间不会 panic，中毒时继续使用内部数据
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn visible(&self, item: &StoredCertificate) -> StoredCertificate {
        let mut item = item.clone();
        if self.hides_private_keys {
            item.private_key_pem = None;
        }
        item
    }
}

#[async_trait]
impl CertificateStore for MemoryCertificateStore {
    async fn list_page(
        &self,
        cancel: &CancellationToken,
        page_number: u32,
        page_size: u32,
    ) -> Result<StorePage> {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let items = self.lock();
        let start = (page_number.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        let page = items
            .iter()
            .skip(start)
            .take(page_size as usize)
            .map(|item| self.visible(item))
            .collect();

        Ok(StorePage {
            items: page,
            total: Some(items.len() as u64),
        })
    }

    async fn create(
        &self,
        _cancel: &CancellationToken,
        request: CreateCertificate<'_>,
    ) -> Result<Option<String>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        self.lock().push(StoredCertificate {
            id: id.clone(),
            name: request.name.to_string(),
            description: None,
            certificate_pem: request.certificate_pem.to_string(),
            private_key_pem: Some(request.private_key_pem.to_string()),
        });

        Ok((!self.omits_create_id).then_some(id))
    }

    async fn get(
        &self,
        _cancel: &CancellationToken,
        id_or_name: &str,
    ) -> Result<Option<StoredCertificate>> {
        Ok(self
            .lock()
            .iter()
            .find(|item| item.id == id_or_name || item.name == id_or_name)
            .map(|item| self.visible(item)))
    }

    async fn update(
        &self,
        _cancel: &CancellationToken,
        existing: &StoredCertificate,
        certificate_pem: &str,
        private_key_pem: &str,
    ) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let mut items = self.lock();
        let item = items
            .iter_mut()
            .find(|item| item.id == existing.id)
            .ok_or_else(|| DeployError::not_found("certificate", existing.id.clone()))?;
        item.certificate_pem = certificate_pem.to_string();
        item.private_key_pem = Some(private_key_pem.to_string());
        item.description.clone_from(&existing.description);
        Ok(())
    }
}

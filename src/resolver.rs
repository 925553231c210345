//! # 域名匹配解析
//!
//! 根据匹配模式决定证书要推送到目标端的哪些域名：
//!
//! - `exact`：只使用配置的域名，不查询远端；
//! - `wildcard`：配置为 `*.example.com` 时，枚举远端全部域名并保留单级子域；
//! - `certsan`：枚举远端全部域名，保留能通过证书主机名校验的域名。
//!
//! 输出保持远端列表的原始顺序并去重。

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{DeployError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::tls::ParsedCertificate;
use crate::{ldebug, linfo};

/// 防止远端分页实现有误时无限翻页
const MAX_PAGES: u32 = 10_000;

/// 域名匹配模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPattern {
    /// 精确匹配
    #[default]
    Exact,
    /// 通配符展开
    Wildcard,
    /// 按证书 SAN 匹配
    #[serde(rename = "certsan")]
    CertSan,
}

impl MatchPattern {
    /// 配置中的字符串表示
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Wildcard => "wildcard",
            Self::CertSan => "certsan",
        }
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchPattern {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "exact" => Ok(Self::Exact),
            "wildcard" => Ok(Self::Wildcard),
            "certsan" => Ok(Self::CertSan),
            other => Err(DeployError::config(format!(
                "unsupported domain match pattern: '{other}'"
            ))),
        }
    }
}

/// 远端域名分页结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainPage {
    /// 本页域名
    pub domains: Vec<String>,
    /// 是否还有下一页
    pub has_more: bool,
}

/// 目标端"全部已知域名"的分页来源，由具体 provider 实现
#[async_trait]
pub trait DomainLister: Send + Sync {
    /// 读取第 `page` 页（从 1 开始）
    async fn list_domains(&self, cancel: &CancellationToken, page: u32) -> Result<DomainPage>;
}

/// 一次性返回全部域名的列表来源
#[derive(Debug, Clone, Default)]
pub struct StaticDomainLister {
    domains: Vec<String>,
}

impl StaticDomainLister {
    /// 使用固定域名列表创建
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl DomainLister for StaticDomainLister {
    async fn list_domains(&self, _cancel: &CancellationToken, page: u32) -> Result<DomainPage> {
        if page > 1 {
            return Ok(DomainPage::default());
        }
        Ok(DomainPage {
            domains: self.domains.clone(),
            has_more: false,
        })
    }
}

/// 解析需要部署的域名集合
///
/// `certificate_pem` 只在 `certsan` 模式下被解析。
pub async fn resolve_domains(
    cancel: &CancellationToken,
    pattern: MatchPattern,
    configured_domain: &str,
    certificate_pem: &str,
    lister: &dyn DomainLister,
) -> Result<Vec<String>> {
    let configured = configured_domain.trim();

    let domains = match pattern {
        MatchPattern::Exact => resolve_exact(configured)?,
        MatchPattern::Wildcard => {
            if !configured.starts_with("*.") {
                resolve_exact(configured)?
            } else {
                let remote = list_all_domains(cancel, lister).await?;
                let matched = filter_unique(remote, |d| match_wildcard(configured, d));
                if matched.is_empty() {
                    return Err(DeployError::no_match(format!(
                        "no domains matched wildcard '{configured}'"
                    )));
                }
                matched
            }
        }
        MatchPattern::CertSan => {
            let certificate = ParsedCertificate::from_pem(certificate_pem)?;
            let remote = list_all_domains(cancel, lister).await?;
            let matched = filter_unique(remote, |d| certificate.verify_hostname(d));
            if matched.is_empty() {
                return Err(DeployError::no_match(format!(
                    "no domains matched certificate SANs {:?}",
                    certificate.domains()
                )));
            }
            matched
        }
    };

    linfo!(
        "-",
        LogStage::Resolve,
        LogComponent::Resolver,
        "domains_resolved",
        &format!("pattern={pattern}, resolved {} domain(s): {domains:?}", domains.len())
    );
    Ok(domains)
}

/// 单级通配符匹配：`*.example.com` 匹配 `sub.example.com`，
/// 不匹配 `example.com` 与 `a.sub.example.com`；非通配符时退化为相等比较
#[must_use]
pub fn match_wildcard(pattern: &str, domain: &str) -> bool {
    let pattern = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(suffix) => match domain.split_once('.') {
            Some((label, rest)) => !label.is_empty() && label != "*" && rest == suffix,
            None => false,
        },
        None => !pattern.is_empty() && pattern == domain,
    }
}

fn resolve_exact(configured: &str) -> Result<Vec<String>> {
    if configured.is_empty() {
        return Err(DeployError::config("config `domain` is required"));
    }
    Ok(vec![configured.to_string()])
}

/// 翻完远端全部分页
pub async fn list_all_domains(
    cancel: &CancellationToken,
    lister: &dyn DomainLister,
) -> Result<Vec<String>> {
    let mut all = Vec::new();
    let mut page = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        let result = lister.list_domains(cancel, page).await?;
        ldebug!(
            "-",
            LogStage::Resolve,
            LogComponent::Resolver,
            "list_domains_page",
            &format!("page {page} returned {} domain(s)", result.domains.len())
        );

        let empty = result.domains.is_empty();
        all.extend(result.domains);
        if !result.has_more || empty || page >= MAX_PAGES {
            break;
        }
        page += 1;
    }

    Ok(all)
}

fn filter_unique<F>(domains: Vec<String>, mut keep: F) -> Vec<String>
where
    F: FnMut(&str) -> bool,
{
    let mut seen = HashSet::new();
    domains
        .into_iter()
        .filter(|d| keep(d.as_str()) && seen.insert(d.trim().to_ascii_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 分页返回并记录调用次数
    struct PagedLister {
        pages: Vec<Vec<&'static str>>,
        calls: AtomicU32,
    }

    impl PagedLister {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DomainLister for PagedLister {
        async fn list_domains(&self, _cancel: &CancellationToken, page: u32) -> Result<DomainPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = (page - 1) as usize;
            Ok(DomainPage {
                domains: self
                    .pages
                    .get(idx)
                    .map(|p| p.iter().map(|s| (*s).to_string()).collect())
                    .unwrap_or_default(),
                has_more: idx + 1 < self.pages.len(),
            })
        }
    }

    #[rstest]
    #[case("*.example.com", "www.example.com", true)]
    #[case("*.example.com", "WWW.Example.com", true)]
    #[case("*.example.com", "example.com", false)]
    #[case("*.example.com", "a.sub.example.com", false)]
    #[case("*.example.com", "other.org", false)]
    #[case("*.example.com", "*.example.com", false)]
    #[case("a.com", "a.com", true)]
    #[case("", "", false)]
    fn wildcard_rules(#[case] pattern: &str, #[case] domain: &str, #[case] expected: bool) {
        assert_eq!(match_wildcard(pattern, domain), expected);
    }

    #[rstest]
    #[case("exact", MatchPattern::Exact)]
    #[case("", MatchPattern::Exact)]
    #[case("Wildcard", MatchPattern::Wildcard)]
    #[case("certsan", MatchPattern::CertSan)]
    fn parses_patterns(#[case] raw: &str, #[case] expected: MatchPattern) {
        assert_eq!(raw.parse::<MatchPattern>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_pattern() {
        assert!("regex".parse::<MatchPattern>().unwrap_err().is_config());
    }

    #[tokio::test]
    async fn exact_never_lists() {
        let lister = PagedLister::new(vec![vec!["other.org"]]);
        let cancel = CancellationToken::new();
        let domains = resolve_domains(&cancel, MatchPattern::Exact, "a.com", "", &lister)
            .await
            .unwrap();
        assert_eq!(domains, vec!["a.com"]);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exact_requires_domain() {
        let lister = StaticDomainLister::default();
        let cancel = CancellationToken::new();
        let err = resolve_domains(&cancel, MatchPattern::Exact, "  ", "", &lister)
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn wildcard_pages_through_remote_list() {
        let lister = PagedLister::new(vec![
            vec!["www.example.com", "other.org"],
            vec!["api.example.com", "www.example.com"],
            vec!["deep.api.example.com"],
        ]);
        let cancel = CancellationToken::new();
        let domains =
            resolve_domains(&cancel, MatchPattern::Wildcard, "*.example.com", "", &lister)
                .await
                .unwrap();
        assert_eq!(domains, vec!["www.example.com", "api.example.com"]);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wildcard_without_star_behaves_like_exact() {
        let lister = PagedLister::new(vec![vec!["www.example.com"]]);
        let cancel = CancellationToken::new();
        let domains = resolve_domains(&cancel, MatchPattern::Wildcard, "example.com", "", &lister)
            .await
            .unwrap();
        assert_eq!(domains, vec!["example.com"]);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wildcard_without_matches_is_no_match() {
        let lister = StaticDomainLister::new(["other.org"]);
        let cancel = CancellationToken::new();
        let err = resolve_domains(&cancel, MatchPattern::Wildcard, "*.example.com", "", &lister)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::NoMatch { .. }));
    }

    /// 返回第一页时取消令牌
    struct CancellingLister {
        inner: PagedLister,
    }

    #[async_trait]
    impl DomainLister for CancellingLister {
        async fn list_domains(&self, cancel: &CancellationToken, page: u32) -> Result<DomainPage> {
            cancel.cancel();
            self.inner.list_domains(cancel, page).await
        }
    }

    #[tokio::test]
    async fn listing_checks_cancellation_between_pages() {
        let lister = CancellingLister {
            inner: PagedLister::new(vec![
                vec!["www.example.com"],
                vec!["api.example.com"],
                vec!["cdn.example.com"],
            ]),
        };
        let cancel = CancellationToken::new();
        let err = resolve_domains(&cancel, MatchPattern::Wildcard, "*.example.com", "", &lister)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(lister.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listing_stops_when_cancelled() {
        let lister = PagedLister::new(vec![vec!["www.example.com"]]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolve_domains(&cancel, MatchPattern::Wildcard, "*.example.com", "", &lister)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(lister.calls.load(Ordering::SeqCst), 0);
    }
}

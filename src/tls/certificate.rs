//! # 证书工具模块
//!
//! 解析 PEM 证书，提供主机名校验与指纹计算

use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::parse_certificates;
use crate::error::{DeployError, Result};

/// 已解析证书的只读视图
///
/// 仅在内存中派生，不做持久化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    /// 主题 CN
    pub common_name: Option<String>,
    /// DNS 类型的 SAN，小写
    pub dns_names: Vec<String>,
    /// IP 类型的 SAN
    pub ip_addresses: Vec<IpAddr>,
    /// 序列号（十六进制，冒号分隔）
    pub serial_number: String,
    /// 主题
    pub subject: String,
    /// 颁发者
    pub issuer: String,
    /// 生效时间
    pub not_before: DateTime<Utc>,
    /// 过期时间
    pub not_after: DateTime<Utc>,
    /// DER 的 SHA-256 指纹（小写十六进制）
    pub fingerprint_sha256: String,
}

impl ParsedCertificate {
    /// 从 PEM 文本解析第一张证书（即服务器证书）
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let blocks = parse_certificates(pem_text)?;
        let first = blocks
            .first()
            .ok_or_else(|| DeployError::certificate("no CERTIFICATE block found in PEM"))?;
        Self::from_der(first.contents())
    }

    /// 从 DER 字节解析
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
            DeployError::certificate_with_source("failed to parse x509 certificate", e)
        })?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        let mut dns_names = Vec::new();
        let mut ip_addresses = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => dns_names.push(dns.to_ascii_lowercase()),
                    GeneralName::IPAddress(raw) => {
                        if let Some(ip) = ip_from_bytes(raw) {
                            ip_addresses.push(ip);
                        }
                    }
                    _ => {}
                }
            }
        }

        let not_before = asn1_to_utc(cert.validity().not_before.timestamp())?;
        let not_after = asn1_to_utc(cert.validity().not_after.timestamp())?;

        let parsed = Self {
            common_name,
            dns_names,
            ip_addresses,
            serial_number: cert.raw_serial_as_string(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before,
            not_after,
            fingerprint_sha256: hex::encode(Sha256::digest(der)),
        };

        debug!(
            subject = %parsed.subject,
            sans = parsed.dns_names.len(),
            "Parsed certificate"
        );
        Ok(parsed)
    }

    /// 用于展示的域名列表；没有 SAN 时退回 CN
    ///
    /// 主机名校验不使用此列表，见 [`Self::verify_hostname`]。
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        if !self.dns_names.is_empty() {
            return self.dns_names.clone();
        }
        self.common_name
            .iter()
            .map(|cn| cn.to_ascii_lowercase())
            .collect()
    }

    /// 按 X.509 规则校验主机名
    ///
    /// - IP 形式的主机名只与 IP SAN 比较；
    /// - 通配符只允许出现在最左侧标签且必须是完整的 `*`，匹配恰好一级；
    /// - 只认 SAN，CN 不参与校验。
    #[must_use]
    pub fn verify_hostname(&self, host: &str) -> bool {
        let host = host.trim().trim_end_matches('.');
        if host.is_empty() {
            return false;
        }

        let candidate = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            return self.ip_addresses.contains(&ip);
        }

        let host = host.to_ascii_lowercase();
        self.dns_names
            .iter()
            .any(|pattern| match_hostname(pattern.trim_end_matches('.'), &host))
    }

    /// 是否已过期
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.not_after
    }

    /// 剩余有效时间
    #[must_use]
    pub fn remaining_validity(&self) -> chrono::Duration {
        self.not_after - Utc::now()
    }
}

/// 单个证书名称与主机名的匹配（两者均已小写）
fn match_hostname(pattern: &str, host: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    let Some(suffix) = pattern.strip_prefix("*.") else {
        return pattern == host;
    };
    if suffix.is_empty() || suffix.contains('*') {
        return false;
    }

    match host.split_once('.') {
        Some((label, rest)) => !label.is_empty() && rest == suffix,
        None => false,
    }
}

fn ip_from_bytes(raw: &[u8]) -> Option<IpAddr> {
    match raw.len() {
        4 => <[u8; 4]>::try_from(raw).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(raw).ok().map(IpAddr::from),
        _ => None,
    }
}

fn asn1_to_utc(timestamp: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| DeployError::certificate(format!("invalid certificate time: {timestamp}")))
}

//! # TLS 模块
//!
//! PEM 文本处理与 X.509 证书解析。部署核心只接收完整的 PEM 文本，
//! 不读取证书文件路径。

pub mod certificate;

pub use certificate::ParsedCertificate;

use pem::{EncodeConfig, LineEnding, Pem};

use crate::error::{DeployError, Result};

/// 证书块标签
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// 解析 PEM 中的第一张证书
pub fn parse_certificate(pem_text: &str) -> Result<ParsedCertificate> {
    ParsedCertificate::from_pem(pem_text)
}

/// 解析 PEM 文本中的全部证书块，忽略其它标签
pub fn parse_certificates(pem_text: &str) -> Result<Vec<Pem>> {
    let blocks = pem::parse_many(pem_text.as_bytes())
        .map_err(|e| DeployError::certificate_with_source("failed to decode certificate PEM", e))?;
    Ok(blocks
        .into_iter()
        .filter(|block| block.tag() == CERTIFICATE_TAG)
        .collect())
}

/// 以 LF 行尾、64 列折行重新编码，多个块直接拼接
#[must_use]
pub fn encode_pem_blocks(blocks: &[Pem]) -> String {
    let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
    blocks
        .iter()
        .map(|block| pem::encode_config(block, config))
        .collect()
}

/// 把证书链拆分为服务器证书与颁发者证书链
///
/// 返回 `(server_pem, issuer_pem)`；只有一张证书时颁发者部分为空串。
pub fn split_chain(chain_pem: &str) -> Result<(String, String)> {
    let blocks = parse_certificates(chain_pem)?;
    let Some((server, issuer)) = blocks.split_first() else {
        return Err(DeployError::certificate("no CERTIFICATE block found in PEM"));
    };
    Ok((
        encode_pem_blocks(std::slice::from_ref(server)),
        encode_pem_blocks(issuer),
    ))
}

/// 去除全部空白字符（空格、制表符、换行），用于内容比较
#[must_use]
pub fn normalize_pem(pem_text: &str) -> String {
    pem_text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 校验私钥 PEM 是否至少包含一个私钥块
pub fn validate_private_key(key_pem: &str) -> Result<()> {
    let parsed = pem::parse_many(key_pem.as_bytes())
        .map_err(|e| DeployError::certificate_with_source("failed to decode private key PEM", e))?;
    if parsed.iter().any(|p| p.tag().ends_with("PRIVATE KEY")) {
        Ok(())
    } else {
        Err(DeployError::certificate("no PRIVATE KEY block found in PEM"))
    }
}

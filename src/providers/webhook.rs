//! # Webhook 部署器
//!
//! 把证书通过一次 HTTP 请求推送给用户自己的服务。请求体是扩展配置
//! `webhookData` 给出的 JSON 模板，其中字符串值里的变量在发送前被替换：
//!
//! | 变量 | 含义 |
//! |------|------|
//! | `${DOMAIN}` | 证书的第一个域名 |
//! | `${DOMAINS}` | 证书全部域名，以 `;` 分隔 |
//! | `${CERTIFICATE}` | 完整证书链 PEM |
//! | `${SERVER_CERTIFICATE}` | 服务器证书 PEM |
//! | `${ISSUER_CERTIFICATE}` | 颁发者证书链 PEM |
//! | `${PRIVATE_KEY}` | 私钥 PEM |
//!
//! 替换发生在解析后的 JSON 字符串节点上，PEM 中的换行会被正确转义。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use serde_with::serde_as;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info_span};

use crate::config::{ConfigMap, ConfigMapExt, Lenient, populate, require_non_empty};
use crate::deployer::{DeployResult, Deployer};
use crate::error::{ConfigContext, DeployError, Result, SdkContext};
use crate::logging::{LogComponent, LogStage};
use crate::tls::{ParsedCertificate, split_chain};
use crate::{config_error, ensure_config, ldebug, linfo, sdk_error};

/// 默认请求超时
const DEFAULT_TIMEOUT_SECONDS: i64 = 30;

/// 未配置模板时使用的请求体
const DEFAULT_WEBHOOK_DATA: &str =
    r#"{"name":"${DOMAINS}","cert":"${CERTIFICATE}","privkey":"${PRIVATE_KEY}"}"#;

/// 访问配置
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookAccessConfig {
    /// 回调地址，仅支持 http/https
    #[serde(rename = "url")]
    pub url: String,
    /// HTTP 方法，默认 POST
    #[serde(rename = "method")]
    pub method: String,
    /// 是否跳过 TLS 证书校验
    #[serde(rename = "allowInsecureConnections")]
    #[serde_as(as = "Lenient")]
    pub allow_insecure_connections: bool,
    /// 请求超时（秒）
    #[serde(rename = "timeout")]
    #[serde_as(as = "Option<Lenient>")]
    pub timeout_seconds: Option<i64>,
}

/// 扩展配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookDeployConfig {
    /// JSON 请求体模板
    #[serde(rename = "webhookData")]
    pub webhook_data: String,
}

/// 模板变量取值
#[derive(Debug, Clone, Default)]
struct TemplateVars {
    domain: String,
    domains: String,
    certificate: String,
    server_certificate: String,
    issuer_certificate: String,
    private_key: String,
}

impl TemplateVars {
    fn from_pem(cert_pem: &str, privkey_pem: &str) -> Result<Self> {
        let parsed = ParsedCertificate::from_pem(cert_pem)?;
        let domains = parsed.domains();
        let (server, issuer) = split_chain(cert_pem)?;

        Ok(Self {
            domain: domains.first().cloned().unwrap_or_default(),
            domains: domains.join(";"),
            certificate: cert_pem.to_string(),
            server_certificate: server,
            issuer_certificate: issuer,
            private_key: privkey_pem.to_string(),
        })
    }

    fn substitute(&self, text: &str) -> String {
        text.replace("${DOMAIN}", &self.domain)
            .replace("${DOMAINS}", &self.domains)
            .replace("${CERTIFICATE}", &self.certificate)
            .replace("${SERVER_CERTIFICATE}", &self.server_certificate)
            .replace("${ISSUER_CERTIFICATE}", &self.issuer_certificate)
            .replace("${PRIVATE_KEY}", &self.private_key)
    }
}

/// 在 JSON 模板的所有字符串节点（含对象键）上替换变量
fn render_template(template: &Value, vars: &TemplateVars) -> Value {
    match template {
        Value::String(s) => Value::String(vars.substitute(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_template(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (vars.substitute(k), render_template(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Webhook 部署器
pub struct WebhookDeployer {
    url: url::Url,
    method: Method,
    headers: HashMap<String, String>,
    allow_insecure: bool,
    timeout: Duration,
    template: Value,
    client: OnceCell<Client>,
    logger: Span,
}

impl std::fmt::Debug for WebhookDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDeployer")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("allow_insecure", &self.allow_insecure)
            .finish_non_exhaustive()
    }
}

impl WebhookDeployer {
    /// 由原始配置构造
    pub fn new(access: &ConfigMap, extended: &ConfigMap) -> Result<Self> {
        let access_config: WebhookAccessConfig = populate(access)?;
        let deploy_config: WebhookDeployConfig = populate(extended)?;

        require_non_empty("url", &access_config.url)?;
        let url = url::Url::parse(access_config.url.trim())
            .with_config_context(|| format!("invalid webhook url '{}'", access_config.url))?;
        ensure_config!(
            matches!(url.scheme(), "http" | "https"),
            "unsupported webhook url scheme '{}'",
            url.scheme()
        );

        let method = match access_config.method.trim() {
            "" => Method::POST,
            raw => {
                let upper = raw.to_ascii_uppercase();
                match upper.as_str() {
                    "GET" | "POST" | "PUT" | "PATCH" | "DELETE" => {
                        Method::from_bytes(upper.as_bytes())
                            .with_config_context(|| format!("invalid webhook method '{raw}'"))?
                    }
                    _ => return Err(config_error!("unsupported webhook method '{}'", raw)),
                }
            }
        };

        let template_text = if deploy_config.webhook_data.trim().is_empty() {
            DEFAULT_WEBHOOK_DATA
        } else {
            deploy_config.webhook_data.as_str()
        };
        let template: Value = serde_json::from_str(template_text)
            .with_config_context(|| "config `webhookData` must be valid JSON")?;

        let timeout_seconds = access_config
            .timeout_seconds
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

        Ok(Self {
            url,
            method,
            headers: access.get_string_map("headers"),
            allow_insecure: access_config.allow_insecure_connections,
            timeout: Duration::from_secs(timeout_seconds.unsigned_abs()),
            template,
            client: OnceCell::new(),
            logger: info_span!("provider", id = super::WEBHOOK),
        })
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                Client::builder()
                    .timeout(self.timeout)
                    .danger_accept_invalid_certs(self.allow_insecure)
                    .user_agent(concat!("certdeploy/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .sdk_context("webhook.client")
            })
            .await
    }

    async fn send(&self, body: Value) -> Result<DeployResult> {
        let client = self.client().await?;

        let mut request = client.request(self.method.clone(), self.url.clone());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = if self.method == Method::GET {
            let query: Vec<(String, String)> = body
                .as_object()
                .map(|map| {
                    map.iter()
                        .map(|(k, v)| {
                            let v = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                            (k.clone(), v)
                        })
                        .collect()
                })
                .unwrap_or_default();
            request.query(&query)
        } else {
            request.json(&body)
        };

        let response = request.send().await.sdk_context("webhook.send")?;
        let status = response.status();
        let text = response.text().await.sdk_context("webhook.read_response")?;

        ldebug!(
            "-",
            LogStage::Deploy,
            LogComponent::Provider,
            "webhook_response",
            &format!("webhook responded with {status}")
        );

        if !status.is_success() {
            return Err(sdk_error!(
                "webhook.send",
                "unexpected status {}: {}",
                status.as_u16(),
                text
            ));
        }

        let mut data = ConfigMap::new();
        data.insert("statusCode".to_string(), json!(status.as_u16()));
        data.insert("response".to_string(), Value::String(text));
        Ok(DeployResult::with_data(data))
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

        let vars = TemplateVars::from_pem(cert_pem, privkey_pem)?;
        let body = render_template(&self.template, &vars);

        let result = tokio::select! {
            () = cancel.cancelled() => return Err(DeployError::Cancelled),
            result = self.send(body) => result?,
        };

        linfo!(
            "-",
            LogStage::Deploy,
            LogComponent::Provider,
            "webhook_sent",
            &format!("certificate for [{}] sent to {}", vars.domains, self.url)
        );
        Ok(result)
    }
}

#[async_trait]
impl Deployer for WebhookDeployer {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test input must be an object"),
        }
    }

    #[test]
    fn template_substitution_escapes_pem() {
        let vars = TemplateVars {
            domain: "a.com".to_string(),
            domains: "a.com;b.com".to_string(),
            certificate: "-----BEGIN CERTIFICATE-----\nAAA\n-----END CERTIFICATE-----\n".to_string(),
            private_key: "KEY\n".to_string(),
            ..TemplateVars::default()
        };
        let template: Value =
            serde_json::from_str(r#"{"d":"${DOMAIN}","all":["${DOMAINS}"],"c":"${CERTIFICATE}","n":1}"#)
                .unwrap();

        let rendered = render_template(&template, &vars);
        assert_eq!(rendered["d"], json!("a.com"));
        assert_eq!(rendered["all"], json!(["a.com;b.com"]));
        assert_eq!(rendered["n"], json!(1));
        let text = serde_json::to_string(&rendered).unwrap();
        assert!(text.contains(r"AAA\n-----END"));
    }

    #[test]
    fn requires_url() {
        let err = WebhookDeployer::new(&ConfigMap::new(), &ConfigMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "config error: config `url` is required");
    }

    #[test]
    fn rejects_non_http_scheme_and_bad_method() {
        let access = raw(json!({ "url": "ftp://example.com/hook" }));
        assert!(WebhookDeployer::new(&access, &ConfigMap::new()).is_err());

        let access = raw(json!({ "url": "https://example.com/hook", "method": "TRACE" }));
        assert!(WebhookDeployer::new(&access, &ConfigMap::new()).unwrap_err().is_config());
    }

    #[test]
    fn rejects_invalid_template() {
        let access = raw(json!({ "url": "https://example.com/hook" }));
        let extended = raw(json!({ "webhookData": "{not json" }));
        assert!(WebhookDeployer::new(&access, &extended).unwrap_err().is_config());
    }

    #[test]
    fn parses_lenient_access_config() {
        let access = raw(json!({
            "url": "https://example.com/hook",
            "method": "put",
            "allowInsecureConnections": "true",
            "timeout": "5",
            "headers": "X-Token: abc",
        }));
        let deployer = WebhookDeployer::new(&access, &ConfigMap::new()).unwrap();
        assert_eq!(deployer.method, Method::PUT);
        assert!(deployer.allow_insecure);
        assert_eq!(deployer.timeout, Duration::from_secs(5));
        assert_eq!(deployer.headers.get("X-Token").map(String::as_str), Some("abc"));
    }
}

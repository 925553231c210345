//! # Webhook provider 集成测试

mod common;

use certdeploy::providers::WEBHOOK;
use certdeploy::registry;
use certdeploy::tls::normalize_pem;
use certdeploy::DeployError;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn posts_rendered_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("X-Token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let (cert, issuer) = common::chain(&["a.com", "b.com"]);
    let access = common::map(json!({
        "url": format!("{}/hook", server.uri()),
        "headers": { "X-Token": "abc" },
    }));
    let extended = common::map(json!({
        "webhookData": r#"{"domain":"${DOMAIN}","domains":"${DOMAINS}","server":"${SERVER_CERTIFICATE}","issuer":"${ISSUER_CERTIFICATE}","key":"${PRIVATE_KEY}"}"#,
    }));

    registry::register_all_builtins();
    let factory = registry::get_factory(WEBHOOK).unwrap();
    let deployer = factory(&access, &extended).unwrap();
    let cancel = CancellationToken::new();

    let result = deployer.deploy(&cancel, &cert.cert_pem, &cert.key_pem).await.unwrap();
    assert_eq!(result.extended_data["statusCode"], json!(200));
    assert_eq!(result.extended_data["response"], json!("accepted"));

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["domain"], json!("a.com"));
    assert_eq!(body["domains"], json!("a.com;b.com"));
    assert_eq!(normalize_pem(body["issuer"].as_str().unwrap()), normalize_pem(&issuer));
    assert_eq!(body["key"], json!(cert.key_pem));
    assert!(!body["server"].as_str().unwrap().contains(issuer.trim()));
}

#[tokio::test]
async fn default_template_carries_certificate_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let cert = common::self_signed(&["a.com"]);
    let access = common::map(json!({ "url": server.uri() }));

    registry::register_all_builtins();
    let deployer = registry::get_factory(WEBHOOK).unwrap()(&access, &common::map(json!({}))).unwrap();
    deployer
        .deploy(&CancellationToken::new(), &cert.cert_pem, &cert.key_pem)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["name"], json!("a.com"));
    assert_eq!(body["cert"], json!(cert.cert_pem));
    assert_eq!(body["privkey"], json!(cert.key_pem));
}

#[tokio::test]
async fn get_method_sends_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("domain", "a.com"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let cert = common::self_signed(&["a.com"]);
    let access = common::map(json!({ "url": server.uri(), "method": "get" }));
    let extended = common::map(json!({ "webhookData": r#"{"domain":"${DOMAIN}"}"# }));

    registry::register_all_builtins();
    let deployer = registry::get_factory(WEBHOOK).unwrap()(&access, &extended).unwrap();
    deployer
        .deploy(&CancellationToken::new(), &cert.cert_pem, &cert.key_pem)
        .await
        .unwrap();
}

#[tokio::test]
async fn non_success_status_is_sdk_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let cert = common::self_signed(&["a.com"]);
    let access = common::map(json!({ "url": server.uri() }));

    registry::register_all_builtins();
    let deployer = registry::get_factory(WEBHOOK).unwrap()(&access, &common::map(json!({}))).unwrap();
    let err = deployer
        .deploy(&CancellationToken::new(), &cert.cert_pem, &cert.key_pem)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Sdk { ref operation, .. } if operation == "webhook.send"));
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn cancelled_deploy_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cert = common::self_signed(&["a.com"]);
    let access = common::map(json!({ "url": server.uri() }));
    let cancel = CancellationToken::new();
    cancel.cancel();

    registry::register_all_builtins();
    let deployer = registry::get_factory(WEBHOOK).unwrap()(&access, &common::map(json!({}))).unwrap();
    let err = deployer.deploy(&cancel, &cert.cert_pem, &cert.key_pem).await.unwrap_err();
    assert!(err.is_cancelled());
}

//! 集成测试共用的证书生成工具

#![allow(dead_code)]

use certdeploy::ConfigMap;
use serde_json::Value;

/// 一张证书及其私钥
pub struct TestCert {
    pub cert_pem: String,
    pub key_pem: String,
}

/// 生成包含给定 SAN 的自签名证书
pub fn self_signed(sans: &[&str]) -> TestCert {
    let key = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(
        sans.iter().map(|s| (*s).to_string()).collect::<Vec<_>>(),
    )
    .unwrap();
    TestCert {
        cert_pem: params.self_signed(&key).unwrap().pem(),
        key_pem: key.serialize_pem(),
    }
}

/// 生成只有 CN、没有任何 SAN 的自签名证书
pub fn common_name_only(common_name: &str) -> TestCert {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    TestCert {
        cert_pem: params.self_signed(&key).unwrap().pem(),
        key_pem: key.serialize_pem(),
    }
}

/// 生成"服务器证书 + 一张颁发者证书"的链
pub fn chain(sans: &[&str]) -> (TestCert, String) {
    let server = self_signed(sans);
    let issuer = self_signed(&["issuer.test"]).cert_pem;
    let full = TestCert {
        cert_pem: format!("{}{}", server.cert_pem, issuer),
        key_pem: server.key_pem,
    };
    (full, issuer)
}

/// 把 `json!` 对象转换为 `ConfigMap`
pub fn map(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

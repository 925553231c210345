//! # 配置物化
//!
//! 把外部传入、形状不可信的 `ConfigMap` 转换为 provider 自己的强类型配置。
//! 字段通过 `#[serde(rename = "...")]` 声明来源键，宽松转换由
//! [`super::coerce::Lenient`] 适配器完成。缺失字段保持默认值，
//! 是否"必填"由 provider 构造时用 [`require_non_empty`] 等自行校验。

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ConfigMap;
use crate::error::{DeployError, Result};

/// 从单个 map 物化强类型配置
///
/// 值存在但无法转换为目标字段类型时返回 [`DeployError::Config`]。
pub fn populate<T>(raw: &ConfigMap) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(Value::Object(raw.clone())).map_err(|e| {
        DeployError::config_with_source(
            format!(
                "failed to populate {}: {e}",
                short_type_name(std::any::type_name::<T>())
            ),
            e,
        )
    })
}

/// 从访问配置与扩展配置的并集物化；键冲突时扩展配置优先
pub fn populate_merged<T>(access: &ConfigMap, extended: &ConfigMap) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut merged = access.clone();
    for (key, value) in extended {
        merged.insert(key.clone(), value.clone());
    }
    populate(&merged)
}

/// 校验必填字符串字段非空（去除首尾空白后）
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DeployError::config(format!("config `{field}` is required")));
    }
    Ok(())
}

/// 校验必填数值字段为正数
pub fn require_positive(field: &str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(DeployError::config(format!(
            "config `{field}` must be a positive number, got {value}"
        )));
    }
    Ok(())
}

fn short_type_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full)
}

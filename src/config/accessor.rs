//! # 单键读取辅助
//!
//! 对于不值得为其定义结构体字段的零散选项，直接从 `ConfigMap` 读取单个键，
//! 缺失或无法转换时回退到零值或调用方给出的默认值。

use std::collections::HashMap;

use serde_json::Value;

use super::ConfigMap;
use super::coerce;
use crate::error::{DeployError, Result};

/// `ConfigMap` 的读取扩展
pub trait ConfigMapExt {
    /// 读取字符串，缺失或类型不符时返回空串
    fn get_string(&self, key: &str) -> String;

    /// 读取字符串，缺失、空串或类型不符时返回默认值
    fn get_string_or_default(&self, key: &str, default: &str) -> String;

    /// 读取 i32，缺失或无法转换时返回 0
    fn get_i32(&self, key: &str) -> i32;

    /// 读取 i32，缺失或无法转换时返回默认值
    fn get_i32_or_default(&self, key: &str, default: i32) -> i32;

    /// 读取 i64，缺失或无法转换时返回 0
    fn get_i64(&self, key: &str) -> i64;

    /// 读取 i64，缺失或无法转换时返回默认值
    fn get_i64_or_default(&self, key: &str, default: i64) -> i64;

    /// 读取 bool，缺失或无法转换时返回 false
    fn get_bool(&self, key: &str) -> bool;

    /// 读取 bool，缺失或无法转换时返回默认值
    fn get_bool_or_default(&self, key: &str, default: bool) -> bool;

    /// 严格读取 i64：缺失返回 `None`，存在但无法转换返回配置错误
    fn try_get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// 读取嵌套对象
    fn get_map(&self, key: &str) -> Option<&ConfigMap>;

    /// 读取字符串键值表
    ///
    /// 既接受对象形式 `{"X-Token": "abc"}`，也接受逐行 `X-Token: abc` 的文本形式。
    fn get_string_map(&self, key: &str) -> HashMap<String, String>;
}

impl ConfigMapExt for ConfigMap {
    fn get_string(&self, key: &str) -> String {
        self.get_string_or_default(key, "")
    }

    fn get_string_or_default(&self, key: &str, default: &str) -> String {
        match self.get(key).map(coerce::to_string) {
            Some(Ok(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }

    fn get_i32(&self, key: &str) -> i32 {
        self.get_i32_or_default(key, 0)
    }

    fn get_i32_or_default(&self, key: &str, default: i32) -> i32 {
        match self.get(key) {
            Some(Value::Null) | None => default,
            Some(value) => coerce::to_i32(value).unwrap_or(default),
        }
    }

    fn get_i64(&self, key: &str) -> i64 {
        self.get_i64_or_default(key, 0)
    }

    fn get_i64_or_default(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Null) | None => default,
            Some(value) => coerce::to_i64(value).unwrap_or(default),
        }
    }

    fn get_bool(&self, key: &str) -> bool {
        self.get_bool_or_default(key, false)
    }

    fn get_bool_or_default(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Null) | None => default,
            Some(value) => coerce::to_bool(value).unwrap_or(default),
        }
    }

    fn try_get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            Some(Value::Null) | None => Ok(None),
            Some(value) => coerce::to_i64(value)
                .map(Some)
                .map_err(|e| DeployError::config_with_source(format!("config `{key}` is invalid"), e)),
        }
    }

    fn get_map(&self, key: &str) -> Option<&ConfigMap> {
        match self.get(key) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    fn get_string_map(&self, key: &str) -> HashMap<String, String> {
        match self.get(key) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| coerce::to_string(v).ok().map(|v| (k.clone(), v)))
                .collect(),
            Some(Value::String(text)) => text
                .lines()
                .filter_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    let name = name.trim();
                    if name.is_empty() {
                        return None;
                    }
                    Some((name.to_string(), value.trim().to_string()))
                })
                .collect(),
            _ => HashMap::new(),
        }
    }
}

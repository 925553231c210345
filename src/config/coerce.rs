//! # 宽松类型转换
//!
//! 外部传入的配置 map 来自 JSON 解码，同一个选项可能是 `"443"` 也可能是 `443`。
//! 这里集中定义数值/布尔/字符串的宽松转换规则，供物化器字段适配器
//! （`#[serde_as(as = "Lenient")]`）和单键读取辅助函数共用。

use serde::de::{Deserialize, Deserializer, Error as _};
use serde_json::Value;
use serde_with::DeserializeAs;

/// 无法转换时的说明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoerceError {
    expected: &'static str,
    found: String,
}

impl CoerceError {
    fn new(expected: &'static str, value: &Value) -> Self {
        Self {
            expected,
            found: describe(value),
        }
    }
}

impl std::fmt::Display for CoerceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot convert {} to {}", self.found, self.expected)
    }
}

impl std::error::Error for CoerceError {}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// 转换为 i64：数字、数字字符串、布尔；空字符串与 null 视为 0
pub fn to_i64(value: &Value) -> Result<i64, CoerceError> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                #[allow(clippy::cast_possible_truncation)]
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(f as i64)
                }
                _ => Err(CoerceError::new("int64", value)),
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            trimmed
                .parse::<i64>()
                .map_err(|_| CoerceError::new("int64", value))
        }
        Value::Array(_) | Value::Object(_) => Err(CoerceError::new("int64", value)),
    }
}

/// 转换为 i32，超出范围视为失败
pub fn to_i32(value: &Value) -> Result<i32, CoerceError> {
    let wide = to_i64(value).map_err(|_| CoerceError::new("int32", value))?;
    i32::try_from(wide).map_err(|_| CoerceError::new("int32", value))
}

/// 转换为 u16（端口等），超出范围视为失败
pub fn to_u16(value: &Value) -> Result<u16, CoerceError> {
    let wide = to_i64(value).map_err(|_| CoerceError::new("uint16", value))?;
    u16::try_from(wide).map_err(|_| CoerceError::new("uint16", value))
}

/// 转换为 bool：接受 `1/t/true/0/f/false`（不区分大小写）与非零数字
pub fn to_bool(value: &Value) -> Result<bool, CoerceError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "" | "0" | "f" | "false" => Ok(false),
            _ => Err(CoerceError::new("bool", value)),
        },
        Value::Array(_) | Value::Object(_) => Err(CoerceError::new("bool", value)),
    }
}

/// 转换为字符串：数字与布尔按字面量输出，null 视为空串
pub fn to_string(value: &Value) -> Result<String, CoerceError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(_) | Value::Object(_) => Err(CoerceError::new("string", value)),
    }
}

/// `serde_with` 字段适配器：按上面的宽松规则反序列化标量字段
///
/// ```ignore
/// #[serde_as]
/// #[derive(Deserialize, Default)]
/// #[serde(default)]
/// struct ListenerConfig {
///     #[serde(rename = "listenerPort")]
///     #[serde_as(as = "Lenient")]
///     port: i64,
/// }
/// ```
pub struct Lenient;

macro_rules! impl_lenient {
    ($ty:ty, $conv:path) => {
        impl<'de> DeserializeAs<'de, $ty> for Lenient {
            fn deserialize_as<D>(deserializer: D) -> Result<$ty, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = Value::deserialize(deserializer)?;
                $conv(&value).map_err(D::Error::custom)
            }
        }
    };
}

impl_lenient!(i64, to_i64);
impl_lenient!(i32, to_i32);
impl_lenient!(u16, to_u16);
impl_lenient!(bool, to_bool);
impl_lenient!(String, to_string);

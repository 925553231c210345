//! # 错误处理宏

/// 快速创建配置错误的宏
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::DeployError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::DeployError::config(format!($fmt, $($arg)*))
    };
}

/// 快速创建 SDK 调用错误的宏
#[macro_export]
macro_rules! sdk_error {
    ($operation:expr, $msg:expr) => {
        $crate::error::DeployError::sdk($operation, ::anyhow::anyhow!($msg))
    };
    ($operation:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::DeployError::sdk($operation, ::anyhow::anyhow!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回配置错误
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::config_error!($msg));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::config_error!($fmt, $($arg)*));
        }
    };
}

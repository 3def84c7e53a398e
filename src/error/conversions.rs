//! 错误类型转换实现

use super::{ErrorCode, SelectorError};
use std::io;

impl From<io::Error> for SelectorError {
    fn from(err: io::Error) -> Self {
        SelectorError::config(format!("读取配置失败: {}", err))
    }
}

impl From<toml::de::Error> for SelectorError {
    fn from(err: toml::de::Error) -> Self {
        SelectorError::config(format!("TOML 解析错误: {}", err))
    }
}

impl From<SelectorError> for tonic::Status {
    fn from(err: SelectorError) -> Self {
        let message = err.to_string();
        match err.code() {
            ErrorCode::NoAvailableNode => tonic::Status::unavailable(message),
            ErrorCode::UnknownStrategy | ErrorCode::ConfigurationError => {
                tonic::Status::failed_precondition(message)
            }
            _ => tonic::Status::internal(message),
        }
    }
}

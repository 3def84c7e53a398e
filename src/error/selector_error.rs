//! 选择器错误类型

use super::code::ErrorCode;
use thiserror::Error;

/// 选择器自身产生的错误
///
/// 下游调用错误不会经过这里，只会作为评分输入出现在 `DoneInfo` 中
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// 快照为空，或过滤器过滤掉了全部候选节点
    #[error("没有可用的服务节点")]
    NoAvailable,

    /// 注册表中不存在该负载均衡策略
    #[error("未注册的负载均衡策略: {0}")]
    UnknownStrategy(String),

    /// 配置加载或解析失败
    #[error("配置错误: {0}")]
    Config(String),
}

impl SelectorError {
    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        SelectorError::Config(msg.into())
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            SelectorError::NoAvailable => ErrorCode::NoAvailableNode,
            SelectorError::UnknownStrategy(_) => ErrorCode::UnknownStrategy,
            SelectorError::Config(_) => ErrorCode::ConfigurationError,
        }
    }

    /// 是否为“无可用节点”
    pub fn is_no_available(&self) -> bool {
        matches!(self, SelectorError::NoAvailable)
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SelectorError>;

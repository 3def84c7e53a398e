//! 选择器错误处理模块
//!
//! 沿用 flare 的错误代码分类，区分两类错误：
//! - `SelectorError`：选择器自身产生的错误（如无可用节点）
//! - `CallError`：下游调用错误，只作为节点评分的输入

pub mod call_error;
pub mod code;
pub mod conversions;
pub mod selector_error;

// 重新导出公共类型和函数
pub use call_error::{CallError, is_node_failure};
pub use code::{ErrorCategory, ErrorCode};
pub use selector_error::{Result, SelectorError};

/// 通用的装箱错误类型（调用错误、发现后端错误）
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

//! 加权节点实现
//!
//! - `DirectNode`：静态权重，供 random / wrr 使用
//! - `EwmaNode`：根据延迟、成功率和并发自适应计算权重，供 ewma / p2c 使用

pub mod direct;
pub mod ewma;

pub use direct::{DEFAULT_WEIGHT, DirectNode, DirectNodeBuilder};
pub use ewma::{ErrorHandler, EwmaNode, EwmaNodeBuilder, SUCCESS_MAX};

//! 节点选择模块
//!
//! 定义节点选择的核心抽象：
//! - `WeightedNode`：包装原始节点，计算动态权重并提供 Pick/Done 反馈回路
//! - `Balancer`：从候选节点中挑选一个
//! - `Selector`：持有节点快照，执行过滤并委托给 `Balancer`
//!
//! 调用流程：服务发现推送全量节点 → `Rebalancer::apply` 原子替换快照；
//! 每次调用 `Selector::select` 得到节点与 `DoneFunc`，调用结束后
//! 通过 `DoneFunc` 上报耗时与错误，供自适应节点评分

pub mod default;
pub mod filter;
pub mod node;
pub mod peer;
pub mod registry;

pub use default::{DefaultBuilder, DefaultSelector};
pub use filter::{NodeFilter, TagFilter};
pub use node::Node;
pub use peer::Peer;
pub use registry::SelectorRegistry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Extensions;

use crate::error::{BoxError, Result};

/// 单次调用的结束信息
#[derive(Debug, Default)]
pub struct DoneInfo {
    /// 调用错误（只用于本地评分，不会被重新抛出）
    pub err: Option<BoxError>,
    /// 是否已发送数据
    pub bytes_sent: bool,
    /// 是否已收到数据
    pub bytes_received: bool,
}

impl DoneInfo {
    /// 成功完成的调用
    pub fn success() -> Self {
        Self {
            err: None,
            bytes_sent: true,
            bytes_received: true,
        }
    }

    /// 以错误结束的调用
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self {
            err: Some(err.into()),
            bytes_sent: true,
            bytes_received: false,
        }
    }
}

/// 调用结束回调
///
/// 每次成功的 `select` 应当调用且仅调用一次；可以在与 `pick` 不同的线程上调用。
/// 重复调用不会 panic（由节点实现保证幂等）
#[derive(Clone)]
pub struct DoneFunc(Arc<dyn Fn(&Extensions, DoneInfo) + Send + Sync>);

impl DoneFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Extensions, DoneInfo) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// 不做任何事的回调
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    /// 上报调用结果
    pub fn call(&self, ctx: &Extensions, info: DoneInfo) {
        (self.0)(ctx, info)
    }
}

impl fmt::Debug for DoneFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DoneFunc")
    }
}

/// 加权节点
pub trait WeightedNode: Send + Sync + fmt::Debug {
    /// 原始节点
    fn raw(&self) -> &Node;

    /// 当前有效权重，越大越优先
    fn weight(&self) -> f64;

    /// 标记一次调用开始，返回结束回调
    fn pick(&self) -> DoneFunc;

    /// 距离上次被选中的时间
    fn pick_elapsed(&self) -> Duration;

    /// 用新的原始节点包装，并共享当前节点的运行时统计
    fn rebind(&self, node: Node) -> Arc<dyn WeightedNode>;
}

/// 加权节点构建器
pub trait WeightedNodeBuilder: Send + Sync {
    fn build(&self, node: Node) -> Arc<dyn WeightedNode>;
}

/// 负载均衡器
pub trait Balancer: Send + Sync {
    /// 从候选节点中选择一个，候选为空时返回 `SelectorError::NoAvailable`
    fn pick(
        &self,
        ctx: &Extensions,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)>;
}

/// 负载均衡器构建器
pub trait BalancerBuilder: Send + Sync {
    fn build(&self) -> Box<dyn Balancer>;
}

/// 接收服务发现推送的全量节点
pub trait Rebalancer: Send + Sync {
    /// 用新的节点列表替换当前快照
    fn apply(&self, nodes: Vec<Node>);
}

/// 节点选择器
pub trait Selector: Rebalancer {
    /// 选择一个节点
    ///
    /// # 参数
    /// * `ctx` - 调用上下文，过滤器可读取其中的值，`Peer` 也放在这里
    /// * `filters` - 按顺序执行的节点过滤器
    ///
    /// # 返回
    /// 选中的原始节点和调用结束回调
    fn select(&self, ctx: &Extensions, filters: &[NodeFilter]) -> Result<(Node, DoneFunc)>;
}

/// 选择器构建器
pub trait SelectorBuilder: Send + Sync {
    fn build(&self) -> Arc<dyn Selector>;
}

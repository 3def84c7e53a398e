//! 静态权重节点
//!
//! 权重取服务发布者设置的显式权重，未设置时为默认值；
//! `pick` 只记录时间，不收集调用统计

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::selector::{DoneFunc, Node, WeightedNode, WeightedNodeBuilder};
use crate::utils::{Clock, SystemClock};

/// 未设置显式权重时的默认权重
pub const DEFAULT_WEIGHT: f64 = 100.0;

/// 静态权重节点
#[derive(Debug)]
pub struct DirectNode {
    node: Node,
    last_pick: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
}

impl DirectNode {
    pub fn new(node: Node, clock: Arc<dyn Clock>) -> Self {
        Self {
            node,
            last_pick: Arc::new(AtomicI64::new(0)),
            clock,
        }
    }
}

impl WeightedNode for DirectNode {
    fn raw(&self) -> &Node {
        &self.node
    }

    fn weight(&self) -> f64 {
        self.node
            .initial_weight()
            .map(|w| w as f64)
            .unwrap_or(DEFAULT_WEIGHT)
    }

    fn pick(&self) -> DoneFunc {
        self.last_pick
            .store(self.clock.now_nanos(), Ordering::Relaxed);
        DoneFunc::noop()
    }

    fn pick_elapsed(&self) -> Duration {
        let elapsed = self.clock.now_nanos() - self.last_pick.load(Ordering::Relaxed);
        Duration::from_nanos(elapsed.max(0) as u64)
    }

    fn rebind(&self, node: Node) -> Arc<dyn WeightedNode> {
        Arc::new(Self {
            node,
            last_pick: Arc::clone(&self.last_pick),
            clock: Arc::clone(&self.clock),
        })
    }
}

/// 静态权重节点构建器
#[derive(Debug, Clone)]
pub struct DirectNodeBuilder {
    clock: Arc<dyn Clock>,
}

impl DirectNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换时钟（测试使用）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for DirectNodeBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }
}

impl WeightedNodeBuilder for DirectNodeBuilder {
    fn build(&self, node: Node) -> Arc<dyn WeightedNode> {
        Arc::new(DirectNode::new(node, Arc::clone(&self.clock)))
    }
}

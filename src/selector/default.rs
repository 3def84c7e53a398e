//! 默认选择器实现

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::Extensions;
use tracing::debug;

use super::{
    Balancer, BalancerBuilder, DoneFunc, Node, NodeFilter, Peer, Rebalancer, Selector,
    SelectorBuilder, WeightedNode, WeightedNodeBuilder,
};
use crate::error::{Result, SelectorError};

/// 一代节点快照，发布后不可变
pub type NodeSnapshot = Vec<Arc<dyn WeightedNode>>;

/// 默认选择器
///
/// 快照保存在 `ArcSwap` 中：`select` 无锁读取完整的一代快照，
/// `apply` 通过一次原子替换发布新一代（后写者胜出）
pub struct DefaultSelector {
    node_builder: Arc<dyn WeightedNodeBuilder>,
    balancer: Box<dyn Balancer>,
    nodes: ArcSwap<NodeSnapshot>,
}

impl DefaultSelector {
    /// 创建新的选择器，初始快照为空
    pub fn new(node_builder: Arc<dyn WeightedNodeBuilder>, balancer: Box<dyn Balancer>) -> Self {
        Self {
            node_builder,
            balancer,
            nodes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<NodeSnapshot> {
        self.nodes.load_full()
    }

    /// 执行过滤器，并把剩余的原始节点映射回加权节点
    fn filter_candidates(
        ctx: &Extensions,
        nodes: &NodeSnapshot,
        filters: &[NodeFilter],
    ) -> NodeSnapshot {
        let mut raw: Vec<Node> = nodes.iter().map(|wn| wn.raw().clone()).collect();
        for filter in filters {
            raw = filter(ctx, raw);
            if raw.is_empty() {
                return Vec::new();
            }
        }

        let by_identity: HashMap<usize, &Arc<dyn WeightedNode>> = nodes
            .iter()
            .map(|wn| (wn.raw().identity(), wn))
            .collect();

        raw.iter()
            .filter_map(|node| match by_identity.get(&node.identity()) {
                Some(wn) => Some(Arc::clone(*wn)),
                None => {
                    debug!(node = %node, "Filter returned a node outside the snapshot, ignored");
                    None
                }
            })
            .collect()
    }
}

impl Rebalancer for DefaultSelector {
    fn apply(&self, nodes: Vec<Node>) {
        let previous = self.nodes.load();
        let by_key: HashMap<(&str, &str), &Arc<dyn WeightedNode>> =
            previous.iter().map(|wn| (wn.raw().key(), wn)).collect();

        let mut reused = 0usize;
        let next: NodeSnapshot = nodes
            .into_iter()
            .map(|node| {
                let existing = by_key.get(&node.key()).map(|wn| Arc::clone(*wn));
                match existing {
                    Some(old) => {
                        reused += 1;
                        old.rebind(node)
                    }
                    None => self.node_builder.build(node),
                }
            })
            .collect();

        debug!(nodes = next.len(), reused, "Selector snapshot applied");
        self.nodes.store(Arc::new(next));
    }
}

impl Selector for DefaultSelector {
    fn select(&self, ctx: &Extensions, filters: &[NodeFilter]) -> Result<(Node, DoneFunc)> {
        let nodes = self.nodes.load_full();
        if nodes.is_empty() {
            return Err(SelectorError::NoAvailable);
        }

        let (selected, done) = if filters.is_empty() {
            self.balancer.pick(ctx, &nodes)?
        } else {
            let candidates = Self::filter_candidates(ctx, &nodes, filters);
            if candidates.is_empty() {
                return Err(SelectorError::NoAvailable);
            }
            self.balancer.pick(ctx, &candidates)?
        };

        let node = selected.raw().clone();
        if let Some(peer) = Peer::from_context(ctx) {
            peer.set_node(node.clone());
        }
        Ok((node, done))
    }
}

/// 默认选择器构建器：加权节点构建器 + 负载均衡器构建器
#[derive(Clone)]
pub struct DefaultBuilder {
    pub node: Arc<dyn WeightedNodeBuilder>,
    pub balancer: Arc<dyn BalancerBuilder>,
}

impl DefaultBuilder {
    pub fn new(node: Arc<dyn WeightedNodeBuilder>, balancer: Arc<dyn BalancerBuilder>) -> Self {
        Self { node, balancer }
    }

    /// 构建具体类型的选择器
    pub fn build_default(&self) -> DefaultSelector {
        DefaultSelector::new(Arc::clone(&self.node), self.balancer.build())
    }
}

impl SelectorBuilder for DefaultBuilder {
    fn build(&self) -> Arc<dyn Selector> {
        Arc::new(self.build_default())
    }
}

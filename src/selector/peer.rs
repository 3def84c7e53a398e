//! Peer 上下文
//!
//! 调用方在上下文中放入一个 `Peer`，`select` 会把最终选中的节点写回，
//! 便于日志与链路追踪，而不改变 `select` 的返回值

use std::sync::Arc;

use http::Extensions;
use parking_lot::RwLock;

use super::Node;

/// 被选中节点的共享槽位
#[derive(Debug, Clone, Default)]
pub struct Peer {
    node: Arc<RwLock<Option<Node>>>,
}

impl Peer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入调用上下文，返回放入的句柄
    pub fn attach(ctx: &mut Extensions) -> Self {
        let peer = Self::new();
        ctx.insert(peer.clone());
        peer
    }

    /// 从调用上下文中取出
    pub fn from_context(ctx: &Extensions) -> Option<&Peer> {
        ctx.get::<Peer>()
    }

    /// 被选中的节点
    pub fn node(&self) -> Option<Node> {
        self.node.read().clone()
    }

    pub(crate) fn set_node(&self, node: Node) {
        *self.node.write() = Some(node);
    }
}

//! Flare Selector Library
//!
//! 客户端负载均衡节点选择：服务发现推送全量节点，调用前由选择器按策略
//! （random、wrr、ewma、p2c）选出一个节点，调用结束后回报结果用于自适应评分。

pub mod balancer;
pub mod config;
pub mod discovery;
pub mod error;
pub mod node;
pub mod selector;
pub mod utils;

// Re-exports
pub use config::{EwmaConfig, SelectorConfig, Strategy};
pub use error::{
    BoxError, CallError, ErrorCategory, ErrorCode, Result, SelectorError, is_node_failure,
};

pub use balancer::{
    EwmaBalancer, EwmaBalancerBuilder, P2cBalancer, P2cBuilder, RandomBalancer, RandomBuilder,
    WrrBalancer, WrrBuilder,
};
pub use discovery::{ServiceInstance, StreamWatcher, Watcher, nodes_from_instances, spawn_watch};
pub use node::{DirectNode, DirectNodeBuilder, EwmaNode, EwmaNodeBuilder};
pub use selector::{
    Balancer, BalancerBuilder, DefaultBuilder, DefaultSelector, DoneFunc, DoneInfo, Node,
    NodeFilter, Peer, Rebalancer, Selector, SelectorBuilder, SelectorRegistry, TagFilter,
    WeightedNode, WeightedNodeBuilder,
};
pub use utils::{Clock, ManualClock, SystemClock};

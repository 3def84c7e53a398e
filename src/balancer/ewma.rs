//! EWMA 负载均衡：直接取权重最大的节点

use std::sync::Arc;

use http::Extensions;

use crate::error::{Result, SelectorError};
use crate::selector::{Balancer, BalancerBuilder, DoneFunc, WeightedNode};

/// 选择 `weight()` 最大的节点，所有评分逻辑都在节点内部
#[derive(Debug, Default, Clone, Copy)]
pub struct EwmaBalancer;

impl Balancer for EwmaBalancer {
    fn pick(
        &self,
        _ctx: &Extensions,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        let Some((first, rest)) = nodes.split_first() else {
            return Err(SelectorError::NoAvailable);
        };

        let mut selected = first;
        let mut best = first.weight();
        for node in rest {
            let weight = node.weight();
            if weight > best {
                best = weight;
                selected = node;
            }
        }

        let selected = Arc::clone(selected);
        let done = selected.pick();
        Ok((selected, done))
    }
}

/// EWMA 负载均衡构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct EwmaBalancerBuilder;

impl BalancerBuilder for EwmaBalancerBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(EwmaBalancer)
    }
}

//! 随机负载均衡

use std::sync::Arc;

use http::Extensions;
use rand::Rng;

use crate::error::{Result, SelectorError};
use crate::selector::{Balancer, BalancerBuilder, DoneFunc, WeightedNode};

/// 随机选择，无共享状态
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBalancer;

impl Balancer for RandomBalancer {
    fn pick(
        &self,
        _ctx: &Extensions,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        if nodes.is_empty() {
            return Err(SelectorError::NoAvailable);
        }
        let index = rand::thread_rng().gen_range(0..nodes.len());
        let selected = Arc::clone(&nodes[index]);
        let done = selected.pick();
        Ok((selected, done))
    }
}

/// 随机负载均衡构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBuilder;

impl BalancerBuilder for RandomBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(RandomBalancer)
    }
}

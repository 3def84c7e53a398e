//! 平滑加权轮询（nginx 算法）
//!
//! 每次选择：所有候选的 current_weight 加上各自权重，选出 current_weight 最大者，
//! 再从它的 current_weight 中减去总权重。权重 [5,1,1] 连续 7 次的结果为
//! `a a b a c a a`，而不是连续 5 次 a

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use http::Extensions;
use parking_lot::Mutex;

use crate::error::{Result, SelectorError};
use crate::selector::{Balancer, BalancerBuilder, DoneFunc, WeightedNode};

/// 平滑加权轮询
///
/// `current_weight` 按地址保存，同一个均衡器上的并发 pick 共享。
/// 记录数超过候选数的 `PRUNE_FACTOR` 倍时，只保留本次候选的地址
#[derive(Debug, Default)]
pub struct WrrBalancer {
    current_weight: Mutex<HashMap<String, f64>>,
}

const PRUNE_FACTOR: usize = 2;

impl WrrBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录了 `current_weight` 的地址数
    pub fn tracked(&self) -> usize {
        self.current_weight.lock().len()
    }
}

impl Balancer for WrrBalancer {
    fn pick(
        &self,
        _ctx: &Extensions,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        let mut total = 0.0;
        let mut selected: Option<(usize, f64)> = None;

        let mut current = self.current_weight.lock();
        for (index, node) in nodes.iter().enumerate() {
            let weight = node.weight();
            total += weight;

            let address = node.raw().address();
            let cw = match current.get_mut(address) {
                Some(cw) => {
                    *cw += weight;
                    *cw
                }
                None => {
                    current.insert(address.to_string(), weight);
                    weight
                }
            };
            // 相同时保留先到达最大值的节点
            if selected.is_none_or(|(_, best)| cw > best) {
                selected = Some((index, cw));
            }
        }

        let Some((index, best)) = selected else {
            return Err(SelectorError::NoAvailable);
        };
        let node = Arc::clone(&nodes[index]);
        current.insert(node.raw().address().to_string(), best - total);
        if current.len() > nodes.len() * PRUNE_FACTOR {
            let live: HashSet<&str> = nodes.iter().map(|n| n.raw().address()).collect();
            current.retain(|address, _| live.contains(address.as_str()));
        }
        drop(current);

        let done = node.pick();
        Ok((node, done))
    }
}

/// 平滑加权轮询构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct WrrBuilder;

impl BalancerBuilder for WrrBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(WrrBalancer::new())
    }
}

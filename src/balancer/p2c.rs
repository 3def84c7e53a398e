//! P2C（Power of Two Choices）负载均衡
//!
//! 随机取两个不同的候选，选择权重较大者。如果落选节点超过 `force_pick`
//! 没有被选中过，强制选它一次，让它的延迟和成功率得到更新

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use http::Extensions;
use rand::Rng;

use crate::error::{Result, SelectorError};
use crate::selector::{Balancer, BalancerBuilder, DoneFunc, WeightedNode};

/// 默认强制选择间隔
pub const DEFAULT_FORCE_PICK: Duration = Duration::from_secs(3);

/// P2C 负载均衡器
#[derive(Debug)]
pub struct P2cBalancer {
    picked: AtomicBool,
    force_pick: Duration,
}

impl P2cBalancer {
    pub fn new(force_pick: Duration) -> Self {
        Self {
            picked: AtomicBool::new(false),
            force_pick,
        }
    }

    fn pre_pick(len: usize) -> (usize, usize) {
        let mut rng = rand::thread_rng();
        let a = rng.gen_range(0..len);
        let mut b = rng.gen_range(0..len - 1);
        if b >= a {
            b += 1;
        }
        (a, b)
    }
}

impl Default for P2cBalancer {
    fn default() -> Self {
        Self::new(DEFAULT_FORCE_PICK)
    }
}

impl Balancer for P2cBalancer {
    fn pick(
        &self,
        _ctx: &Extensions,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        match nodes.len() {
            0 => Err(SelectorError::NoAvailable),
            1 => {
                let selected = Arc::clone(&nodes[0]);
                let done = selected.pick();
                Ok((selected, done))
            }
            len => {
                let (a, b) = Self::pre_pick(len);
                let (mut pc, upc) = if nodes[b].weight() > nodes[a].weight() {
                    (&nodes[b], &nodes[a])
                } else {
                    (&nodes[a], &nodes[b])
                };

                if upc.pick_elapsed() > self.force_pick
                    && self
                        .picked
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    pc = upc;
                    self.picked.store(false, Ordering::Release);
                }

                let selected = Arc::clone(pc);
                let done = selected.pick();
                Ok((selected, done))
            }
        }
    }
}

/// P2C 负载均衡构建器
#[derive(Debug, Clone, Copy)]
pub struct P2cBuilder {
    force_pick: Duration,
}

impl P2cBuilder {
    pub fn with_force_pick(mut self, force_pick: Duration) -> Self {
        self.force_pick = force_pick;
        self
    }
}

impl Default for P2cBuilder {
    fn default() -> Self {
        Self {
            force_pick: DEFAULT_FORCE_PICK,
        }
    }
}

impl BalancerBuilder for P2cBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(P2cBalancer::new(self.force_pick))
    }
}

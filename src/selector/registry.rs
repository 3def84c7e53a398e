//! 选择器工厂注册表
//!
//! 按策略名保存 {加权节点构建器, 负载均衡器构建器} 组合。
//! 注册表是显式对象：启动时构建一次，之后以只读方式向下传递

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{DefaultBuilder, Selector, SelectorBuilder};
use crate::balancer::{EwmaBalancerBuilder, P2cBuilder, RandomBuilder, WrrBuilder};
use crate::config::{EwmaConfig, SelectorConfig, Strategy};
use crate::error::{Result, SelectorError};
use crate::node::{DirectNodeBuilder, EwmaNodeBuilder};

/// 选择器工厂注册表
#[derive(Clone, Default)]
pub struct SelectorRegistry {
    builders: HashMap<String, Arc<dyn SelectorBuilder>>,
}

impl SelectorRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置策略：random、wrr、ewma、p2c
    pub fn with_defaults(ewma: &EwmaConfig) -> Self {
        let direct: Arc<DirectNodeBuilder> = Arc::new(DirectNodeBuilder::default());
        let adaptive: Arc<EwmaNodeBuilder> = Arc::new(EwmaNodeBuilder::from_config(ewma));

        let mut registry = Self::new();
        registry.register(
            Strategy::Random.name(),
            Arc::new(DefaultBuilder::new(direct.clone(), Arc::new(RandomBuilder))),
        );
        registry.register(
            Strategy::WeightedRoundRobin.name(),
            Arc::new(DefaultBuilder::new(direct, Arc::new(WrrBuilder))),
        );
        registry.register(
            Strategy::Ewma.name(),
            Arc::new(DefaultBuilder::new(
                adaptive.clone(),
                Arc::new(EwmaBalancerBuilder),
            )),
        );
        registry.register(
            Strategy::P2c.name(),
            Arc::new(DefaultBuilder::new(adaptive, Arc::new(P2cBuilder::default()))),
        );
        registry
    }

    /// 注册策略，返回被替换的旧构建器
    pub fn register(
        &mut self,
        name: impl Into<String>,
        builder: Arc<dyn SelectorBuilder>,
    ) -> Option<Arc<dyn SelectorBuilder>> {
        let name = name.into();
        debug!(strategy = %name, "Selector strategy registered");
        self.builders.insert(name, builder)
    }

    /// 获取策略构建器
    pub fn get(&self, name: &str) -> Option<Arc<dyn SelectorBuilder>> {
        self.builders.get(name).cloned()
    }

    /// 已注册的策略名（排序后）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }

    /// 按策略名构建选择器
    pub fn build(&self, name: &str) -> Result<Arc<dyn Selector>> {
        self.builders
            .get(name)
            .map(|builder| builder.build())
            .ok_or_else(|| SelectorError::UnknownStrategy(name.to_string()))
    }

    /// 按配置中的策略构建选择器
    ///
    /// 内置策略的别名（如 `weighted_round_robin`、`p2c_ewma`）先归一化为注册名，
    /// 其他名称按原样查找自定义注册
    pub fn build_from_config(&self, config: &SelectorConfig) -> Result<Arc<dyn Selector>> {
        let name = config
            .strategy
            .parse::<Strategy>()
            .map(|strategy| strategy.name())
            .unwrap_or(config.strategy.as_str());
        self.build(name)
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SelectorError};

/// 选择器配置
///
/// ```toml
/// strategy = "p2c"
///
/// [ewma]
/// tau_ms = 600
/// penalty_ms = 10000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SelectorConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String, // random, wrr, ewma, p2c
    #[serde(default)]
    pub ewma: EwmaConfig,
}

fn default_strategy() -> String {
    Strategy::P2c.name().to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            ewma: EwmaConfig::default(),
        }
    }
}

/// EWMA 节点参数
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EwmaConfig {
    /// 衰减时间常数（毫秒），半衰期为 tau*ln(2)
    #[serde(default = "default_tau_ms")]
    pub tau_ms: u64,
    /// 无统计数据时的延迟惩罚（毫秒）
    #[serde(default = "default_penalty_ms")]
    pub penalty_ms: u64,
}

fn default_tau_ms() -> u64 {
    600
}

fn default_penalty_ms() -> u64 {
    10_000
}

impl Default for EwmaConfig {
    fn default() -> Self {
        Self {
            tau_ms: default_tau_ms(),
            penalty_ms: default_penalty_ms(),
        }
    }
}

impl EwmaConfig {
    pub fn tau(&self) -> Duration {
        Duration::from_millis(self.tau_ms.max(1))
    }

    pub fn penalty(&self) -> Duration {
        Duration::from_millis(self.penalty_ms)
    }
}

impl SelectorConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SelectorConfig = toml::from_str(content)?;
        if config.strategy.trim().is_empty() {
            return Err(SelectorError::config("strategy must not be empty"));
        }
        Ok(config)
    }
}

/// 内置负载均衡策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// 随机
    Random,
    /// 平滑加权轮询
    WeightedRoundRobin,
    /// EWMA 自适应（取最大权重）
    Ewma,
    /// 两次随机选择 + EWMA
    P2c,
}

impl Strategy {
    /// 注册表中使用的名称
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Random => "random",
            Strategy::WeightedRoundRobin => "wrr",
            Strategy::Ewma => "ewma",
            Strategy::P2c => "p2c",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace("-", "_").as_str() {
            "random" => Ok(Strategy::Random),
            "wrr" | "weighted_round_robin" | "weightedroundrobin" => {
                Ok(Strategy::WeightedRoundRobin)
            }
            "ewma" => Ok(Strategy::Ewma),
            "p2c" | "p2c_ewma" => Ok(Strategy::P2c),
            _ => Err(format!("Unknown load balance strategy: {}", s)),
        }
    }
}

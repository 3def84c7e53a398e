//! 节点过滤器
//!
//! 过滤器是纯函数 `(ctx, nodes) -> nodes`，在每次 `select` 时按顺序执行，
//! 只能缩小候选集合

use std::sync::Arc;

use http::Extensions;
use serde::{Deserialize, Serialize};

use super::Node;

/// 节点过滤器
pub type NodeFilter = Arc<dyn Fn(&Extensions, Vec<Node>) -> Vec<Node> + Send + Sync>;

/// 按版本过滤
pub fn version(version: impl Into<String>) -> NodeFilter {
    let version = version.into();
    Arc::new(move |_ctx: &Extensions, nodes: Vec<Node>| {
        nodes
            .into_iter()
            .filter(|node| node.version() == version)
            .collect()
    })
}

/// 按元数据过滤
///
/// `value` 为 `None` 时只检查键是否存在
pub fn metadata(key: impl Into<String>, value: Option<String>) -> NodeFilter {
    tags(vec![TagFilter {
        key: key.into(),
        value,
        pattern: None,
    }])
}

/// 按一组标签过滤器过滤，所有条件都满足才保留
pub fn tags(filters: Vec<TagFilter>) -> NodeFilter {
    Arc::new(move |_ctx: &Extensions, nodes: Vec<Node>| {
        nodes
            .into_iter()
            .filter(|node| filters.iter().all(|f| f.matches(node)))
            .collect()
    })
}

/// 标签过滤器
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagFilter {
    /// 标签键
    pub key: String,

    /// 标签值（可选，如果为 None 则只检查键是否存在）
    pub value: Option<String>,

    /// 匹配模式（exact, prefix），默认 exact
    pub pattern: Option<String>,
}

impl TagFilter {
    /// 精确匹配
    pub fn exact(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            pattern: None,
        }
    }

    /// 前缀匹配
    pub fn prefix(key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(prefix.into()),
            pattern: Some("prefix".to_string()),
        }
    }

    /// 检查节点元数据是否匹配
    pub fn matches(&self, node: &Node) -> bool {
        let Some(actual) = node.metadata().get(&self.key) else {
            return false;
        };
        match (&self.value, self.pattern.as_deref()) {
            (None, _) => true,
            (Some(expected), Some("prefix")) => actual.starts_with(expected.as_str()),
            (Some(expected), _) => actual == expected,
        }
    }
}

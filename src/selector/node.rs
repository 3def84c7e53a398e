//! 原始节点定义

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::discovery::ServiceInstance;

/// 元数据中显式权重的键
pub const WEIGHT_METADATA_KEY: &str = "weight";

/// 服务发现得到的一个端点（不可变）
///
/// 内部数据通过 `Arc` 共享，克隆开销很小；发布到快照后不再修改，
/// 拓扑变化时整体替换
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

#[derive(Debug, Clone, Default)]
struct NodeInner {
    scheme: String,
    address: String,
    service_name: String,
    version: String,
    initial_weight: Option<i64>,
    metadata: HashMap<String, String>,
}

impl Node {
    /// 创建新的节点
    pub fn new(scheme: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                scheme: scheme.into(),
                address: address.into(),
                ..Default::default()
            }),
        }
    }

    /// 从服务实例创建节点
    ///
    /// 元数据 `weight` 解析失败或为负数时视为未设置权重，不会报错
    pub fn from_instance(
        scheme: impl Into<String>,
        address: impl Into<String>,
        instance: &ServiceInstance,
    ) -> Self {
        let initial_weight = instance
            .metadata
            .get(WEIGHT_METADATA_KEY)
            .and_then(|raw| match raw.trim().parse::<i64>() {
                Ok(weight) if weight >= 0 => Some(weight),
                _ => {
                    warn!(
                        instance_id = %instance.instance_id,
                        weight = %raw,
                        "Invalid weight metadata, falling back to default weight"
                    );
                    None
                }
            });

        Self {
            inner: Arc::new(NodeInner {
                scheme: scheme.into(),
                address: address.into(),
                service_name: instance.service_type.clone(),
                version: instance.version.clone().unwrap_or_default(),
                initial_weight,
                metadata: instance.metadata.clone(),
            }),
        }
    }

    /// 设置服务名
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).service_name = name.into();
        self
    }

    /// 设置版本
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).version = version.into();
        self
    }

    /// 设置显式权重
    pub fn with_weight(mut self, weight: i64) -> Self {
        Arc::make_mut(&mut self.inner).initial_weight = Some(weight);
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner)
            .metadata
            .insert(key.into(), value.into());
        self
    }

    pub fn scheme(&self) -> &str {
        &self.inner.scheme
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// 服务发布者设置的显式权重
    pub fn initial_weight(&self) -> Option<i64> {
        self.inner.initial_weight
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.inner.metadata
    }

    /// 两个句柄是否指向同一个节点
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 节点身份，用于过滤后映射回加权节点
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// 跨代复用统计数据时使用的键
    pub(crate) fn key(&self) -> (&str, &str) {
        (&self.inner.scheme, &self.inner.address)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("scheme", &self.inner.scheme)
            .field("address", &self.inner.address)
            .field("service_name", &self.inner.service_name)
            .field("version", &self.inner.version)
            .field("initial_weight", &self.inner.initial_weight)
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.inner.scheme, self.inner.address)
    }
}

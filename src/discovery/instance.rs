//! 服务实例定义

use std::collections::HashMap;

use http::Uri;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::selector::Node;

/// 服务实例（注册中心推送的原始数据）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    /// 服务类型（如 "signaling-online", "message-orchestrator"）
    pub service_type: String,

    /// 实例 ID（唯一标识）
    pub instance_id: String,

    /// 版本
    #[serde(default)]
    pub version: Option<String>,

    /// 元数据，`weight` 键用于显式权重
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// 端点列表（如 "grpc://10.0.0.1:9000", "http://10.0.0.1:8000"）
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// 是否健康
    #[serde(default = "default_healthy")]
    pub healthy: bool,
}

fn default_healthy() -> bool {
    true
}

impl ServiceInstance {
    /// 创建新的服务实例
    pub fn new(service_type: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            instance_id: instance_id.into(),
            version: None,
            metadata: HashMap::new(),
            endpoints: Vec::new(),
            healthy: true,
        }
    }

    /// 设置版本
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 添加端点
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// 设置健康状态
    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// 该实例在指定协议下的地址
    pub fn endpoint(&self, scheme: &str) -> Option<String> {
        parse_endpoint(&self.endpoints, scheme)
    }
}

/// 从端点列表中取出第一个协议匹配的 `host:port`
pub fn parse_endpoint(endpoints: &[String], scheme: &str) -> Option<String> {
    endpoints.iter().find_map(|endpoint| {
        let uri = match endpoint.parse::<Uri>() {
            Ok(uri) => uri,
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Skipping malformed endpoint");
                return None;
            }
        };
        if !uri
            .scheme_str()
            .is_some_and(|s| s.eq_ignore_ascii_case(scheme))
        {
            return None;
        }
        uri.authority().map(|authority| authority.to_string())
    })
}

/// 把服务实例列表转换为节点列表
///
/// 不健康的实例和没有该协议端点的实例会被跳过
pub fn nodes_from_instances(scheme: &str, instances: &[ServiceInstance]) -> Vec<Node> {
    instances
        .iter()
        .filter(|instance| instance.healthy)
        .filter_map(|instance| {
            let address = instance.endpoint(scheme)?;
            Some(Node::from_instance(scheme, address, instance))
        })
        .collect()
}

//! 服务发现监听
//!
//! `Watcher` 每次返回服务的全量实例列表；`spawn_watch` 在后台循环读取，
//! 转换为节点后推送给 `Rebalancer`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::instance::{ServiceInstance, nodes_from_instances};
use crate::error::BoxError;
use crate::selector::Rebalancer;

/// 监听出错后的重试间隔
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// 服务实例监听器
#[async_trait]
pub trait Watcher: Send {
    /// 等待下一次全量更新，返回 `Ok(None)` 表示监听已结束
    async fn next(&mut self) -> Result<Option<Vec<ServiceInstance>>, BoxError>;

    /// 停止监听并释放资源
    async fn stop(&mut self) -> Result<(), BoxError>;
}

/// 基于 `Stream` 的监听器
pub struct StreamWatcher<S> {
    stream: S,
    stopped: bool,
}

impl<S> StreamWatcher<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            stopped: false,
        }
    }
}

#[async_trait]
impl<S> Watcher for StreamWatcher<S>
where
    S: Stream<Item = Result<Vec<ServiceInstance>, BoxError>> + Unpin + Send,
{
    async fn next(&mut self) -> Result<Option<Vec<ServiceInstance>>, BoxError> {
        if self.stopped {
            return Ok(None);
        }
        self.stream.next().await.transpose()
    }

    async fn stop(&mut self) -> Result<(), BoxError> {
        self.stopped = true;
        Ok(())
    }
}

/// 在后台持续监听，并把每次更新应用到 `rebalancer`
///
/// # 参数
/// * `rebalancer` - 接收节点列表的选择器
/// * `scheme` - 使用的端点协议（如 "grpc"）
/// * `watcher` - 实例监听器
/// * `shutdown_rx` - 关闭信号，收到信号或发送端被丢弃时退出
///
/// 转换后没有可用节点的更新会被忽略，保留上一代快照
pub fn spawn_watch<R, W>(
    rebalancer: Arc<R>,
    scheme: impl Into<String>,
    mut watcher: W,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> JoinHandle<()>
where
    R: Rebalancer + ?Sized + 'static,
    W: Watcher + 'static,
{
    let scheme = scheme.into();
    tokio::spawn(async move {
        info!(scheme = %scheme, "Service watch started");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!(scheme = %scheme, "Service watch shutting down");
                    break;
                }
                update = watcher.next() => match update {
                    Ok(Some(instances)) => {
                        let nodes = nodes_from_instances(&scheme, &instances);
                        if nodes.is_empty() {
                            warn!(
                                scheme = %scheme,
                                instances = instances.len(),
                                "Update contains no usable node, keeping previous snapshot"
                            );
                            continue;
                        }
                        debug!(scheme = %scheme, nodes = nodes.len(), "Applying service update");
                        rebalancer.apply(nodes);
                    }
                    Ok(None) => {
                        info!(scheme = %scheme, "Service watch stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!(scheme = %scheme, error = %e, "Service watch failed, retrying");
                        let shutdown = tokio::select! {
                            _ = &mut shutdown_rx => true,
                            _ = tokio::time::sleep(RETRY_BACKOFF) => false,
                        };
                        if shutdown {
                            info!(scheme = %scheme, "Service watch shutting down");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = watcher.stop().await {
            warn!(scheme = %scheme, error = %e, "Failed to stop service watcher");
        }
    })
}

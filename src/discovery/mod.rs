//! 服务发现适配
//!
//! 把注册中心推送的服务实例转换为节点，并在后台持续推送给选择器

pub mod instance;
pub mod watch;

pub use instance::{ServiceInstance, nodes_from_instances, parse_endpoint};
pub use watch::{RETRY_BACKOFF, StreamWatcher, Watcher, spawn_watch};

//! 负载均衡策略
//!
//! 所有策略在候选为空时都返回 `SelectorError::NoAvailable`

pub mod ewma;
pub mod p2c;
pub mod random;
pub mod wrr;

pub use ewma::{EwmaBalancer, EwmaBalancerBuilder};
pub use p2c::{DEFAULT_FORCE_PICK, P2cBalancer, P2cBuilder};
pub use random::{RandomBalancer, RandomBuilder};
pub use wrr::{WrrBalancer, WrrBuilder};

//! 负载均衡策略
//!
//! 每个策略从候选 WeightedNode 中选出一个，返回节点与完成回调

pub mod p2c;
pub mod random;
pub mod wrr;

use std::sync::Arc;

pub use p2c::{P2cBalancer, P2cBalancerBuilder};
pub use random::{RandomBalancer, RandomBalancerBuilder};
pub use wrr::{WrrBalancer, WrrBalancerBuilder};

use crate::error::Result;
use crate::node::{DoneFunc, WeightedNode};

/// 负载均衡器
pub trait Balancer: Send + Sync {
    /// 从候选节点中选出一个；候选为空时返回 `SelectorError::NoAvailable`
    fn pick(
        &self,
        candidates: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)>;
}

/// 负载均衡器构建器
pub trait BalancerBuilder: Send + Sync {
    fn build(&self) -> Box<dyn Balancer>;
}

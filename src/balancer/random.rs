//! 随机策略

use std::sync::Arc;

use rand::Rng;

use super::{Balancer, BalancerBuilder};
use crate::error::{Result, SelectorError};
use crate::node::{DoneFunc, WeightedNode};

/// 均匀随机选择
#[derive(Debug, Default)]
pub struct RandomBalancer;

/// 随机策略构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBalancerBuilder;

impl BalancerBuilder for RandomBalancerBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(RandomBalancer)
    }
}

impl Balancer for RandomBalancer {
    fn pick(
        &self,
        candidates: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        if candidates.is_empty() {
            return Err(SelectorError::NoAvailable);
        }
        let chosen = &candidates[rand::thread_rng().gen_range(0..candidates.len())];
        Ok((Arc::clone(chosen), chosen.pick()))
    }
}

//! Power of two choices 策略
//!
//! 随机取两个不同节点比较运行时权重，通常选权重高者；
//! 若权重低的一方超过 forcePick 时间未被选中，则强制选它一次，
//! 避免节点长期拿不到流量、遥测无法更新

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::{Balancer, BalancerBuilder};
use crate::error::{Result, SelectorError};
use crate::node::{DoneFunc, WeightedNode};

// 超过该时长未被选中的节点触发强制选取
const FORCE_PICK: Duration = Duration::from_secs(3);

/// p2c 负载均衡器
#[derive(Default)]
pub struct P2cBalancer {
    // 同一时刻只允许一次强制选取
    picking: AtomicBool,
}

/// p2c 构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct P2cBalancerBuilder;

impl BalancerBuilder for P2cBalancerBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(P2cBalancer::default())
    }
}

impl P2cBalancer {
    /// 随机选出两个不同下标
    fn pre_pick(&self, len: usize) -> (usize, usize) {
        let mut rng = rand::thread_rng();
        let a = rng.gen_range(0..len);
        let mut b = rng.gen_range(0..len - 1);
        if b >= a {
            b += 1;
        }
        (a, b)
    }
}

impl Balancer for P2cBalancer {
    fn pick(
        &self,
        candidates: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        if candidates.is_empty() {
            return Err(SelectorError::NoAvailable);
        }
        if candidates.len() == 1 {
            let chosen = &candidates[0];
            return Ok((Arc::clone(chosen), chosen.pick()));
        }

        let (a, b) = self.pre_pick(candidates.len());
        // pc 为权重高者，upc 为落选者
        let (mut pc, upc) = if candidates[a].weight() > candidates[b].weight() {
            (&candidates[a], &candidates[b])
        } else {
            (&candidates[b], &candidates[a])
        };

        if upc.pick_elapsed() > FORCE_PICK
            && self
                .picking
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            pc = upc;
            self.picking.store(false, Ordering::Release);
        }

        Ok((Arc::clone(pc), pc.pick()))
    }
}

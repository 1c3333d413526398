//! 加权轮询策略
//!
//! 平滑加权轮询：每轮为各节点累加权重，取当前值最大者并扣除总权重。
//! 当前值相同时取地址字典序最小的节点，保证结果可复现

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Balancer, BalancerBuilder};
use crate::error::{Result, SelectorError};
use crate::node::{DoneFunc, WeightedNode};

/// 加权轮询
#[derive(Default)]
pub struct WrrBalancer {
    // 地址 -> 当前权重
    current_weight: Mutex<HashMap<String, f64>>,
}

/// 加权轮询构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct WrrBalancerBuilder;

impl BalancerBuilder for WrrBalancerBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(WrrBalancer::default())
    }
}

impl Balancer for WrrBalancer {
    fn pick(
        &self,
        candidates: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        if candidates.is_empty() {
            return Err(SelectorError::NoAvailable);
        }

        let mut total_weight = 0.0;
        let mut selected: Option<&Arc<dyn WeightedNode>> = None;
        let mut select_weight = 0.0;

        let mut current = self.current_weight.lock();
        for node in candidates {
            let weight = node.weight();
            total_weight += weight;
            let cwt = current
                .entry(node.raw().address().to_string())
                .and_modify(|w| *w += weight)
                .or_insert(weight);
            let cwt = *cwt;
            let better = match selected {
                None => true,
                Some(cur) => {
                    select_weight < cwt
                        || (select_weight == cwt && node.raw().address() < cur.raw().address())
                }
            };
            if better {
                select_weight = cwt;
                selected = Some(node);
            }
        }
        // selected 一定存在，candidates 已判空
        let chosen = Arc::clone(selected.ok_or(SelectorError::NoAvailable)?);
        current.insert(
            chosen.raw().address().to_string(),
            select_weight - total_weight,
        );
        drop(current);

        let done = chosen.pick();
        Ok((chosen, done))
    }
}

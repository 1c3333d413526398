//! 默认选择器实现
//!
//! 节点集合整体存放在一个原子引用后面：apply 整体替换，
//! select 无锁读取，读者看到的要么是旧集合要么是新集合，不会混杂

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::{Builder, Rebalancer, SelectOptions, Selector};
use crate::balancer::{Balancer, BalancerBuilder};
use crate::error::{Result, SelectorError};
use crate::node::{DoneFunc, Node, WeightedNode, WeightedNodeBuilder};

/// 默认选择器
pub struct DefaultSelector {
    node_builder: Arc<dyn WeightedNodeBuilder>,
    balancer: Box<dyn Balancer>,
    nodes: ArcSwap<Vec<Arc<dyn WeightedNode>>>,
}

impl DefaultSelector {
    pub fn new(node_builder: Arc<dyn WeightedNodeBuilder>, balancer: Box<dyn Balancer>) -> Self {
        Self {
            node_builder,
            balancer,
            nodes: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl Rebalancer for DefaultSelector {
    fn apply(&self, nodes: Vec<Node>) {
        let weighted: Vec<Arc<dyn WeightedNode>> = nodes
            .into_iter()
            .map(|n| self.node_builder.build(n))
            .collect();
        self.nodes.store(Arc::new(weighted));
    }
}

impl Selector for DefaultSelector {
    fn select(&self, opts: SelectOptions) -> Result<(Node, DoneFunc)> {
        let snapshot = self.nodes.load();
        if snapshot.is_empty() {
            return Err(SelectorError::NoAvailable);
        }

        let filtered;
        let candidates: &[Arc<dyn WeightedNode>] = if opts.node_filters.is_empty() {
            &snapshot
        } else {
            let mut nodes: Vec<Arc<dyn WeightedNode>> = snapshot.to_vec();
            for filter in &opts.node_filters {
                nodes = filter(&nodes);
            }
            filtered = nodes;
            &filtered
        };
        if candidates.is_empty() {
            return Err(SelectorError::NoAvailable);
        }

        let (chosen, done) = self.balancer.pick(candidates)?;
        let node = chosen.raw().clone();
        if let Some(peer) = &opts.peer {
            peer.set(node.clone());
        }
        Ok((node, done))
    }
}

/// 默认选择器构建器
pub struct DefaultBuilder {
    pub node_builder: Arc<dyn WeightedNodeBuilder>,
    pub balancer_builder: Arc<dyn BalancerBuilder>,
}

impl Builder for DefaultBuilder {
    fn build(&self) -> Arc<dyn Selector> {
        Arc::new(DefaultSelector::new(
            Arc::clone(&self.node_builder),
            self.balancer_builder.build(),
        ))
    }
}

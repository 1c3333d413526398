//! 无遥测的直连节点
//!
//! 上游负载已知均匀时使用，权重固定为初始权重

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{now_nanos, DoneFunc, Node, WeightedNode, WeightedNodeBuilder};

const DEFAULT_WEIGHT: f64 = 100.0;

/// 直连节点
pub struct DirectNode {
    node: Node,
    // 最近一次被选中的时间戳
    last_pick: AtomicI64,
}

/// 直连节点构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectNodeBuilder;

impl WeightedNodeBuilder for DirectNodeBuilder {
    fn build(&self, node: Node) -> Arc<dyn WeightedNode> {
        Arc::new(DirectNode {
            node,
            last_pick: AtomicI64::new(0),
        })
    }
}

impl WeightedNode for DirectNode {
    fn raw(&self) -> &Node {
        &self.node
    }

    fn weight(&self) -> f64 {
        match self.node.initial_weight() {
            Some(w) => w as f64,
            None => DEFAULT_WEIGHT,
        }
    }

    fn pick(&self) -> DoneFunc {
        self.last_pick.store(now_nanos(), Ordering::Relaxed);
        Box::new(|_di| {})
    }

    fn pick_elapsed(&self) -> Duration {
        let elapsed = now_nanos() - self.last_pick.load(Ordering::Relaxed);
        Duration::from_nanos(elapsed.max(0) as u64)
    }
}

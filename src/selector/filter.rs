//! 节点过滤器
//!
//! 纯函数，从候选集中筛掉不符合条件的节点，不修改输入；
//! 多个过滤器从左到右依次收窄

use std::sync::Arc;

use crate::node::WeightedNode;

/// 节点过滤函数
pub type NodeFilter =
    Arc<dyn Fn(&[Arc<dyn WeightedNode>]) -> Vec<Arc<dyn WeightedNode>> + Send + Sync>;

/// 按服务版本过滤
pub fn version(version: impl Into<String>) -> NodeFilter {
    let version = version.into();
    Arc::new(move |nodes| {
        nodes
            .iter()
            .filter(|n| n.raw().version() == version)
            .cloned()
            .collect()
    })
}

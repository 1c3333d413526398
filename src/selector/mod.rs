//! 节点选择器
//!
//! 持有当前节点集合的原子快照，对外提供 select；
//! 对 resolver 只暴露 apply（Rebalancer 切面）

pub mod default;
pub mod filter;
pub mod global;

use std::sync::Arc;

use parking_lot::RwLock;

pub use default::{DefaultBuilder, DefaultSelector};
pub use filter::NodeFilter;
pub use global::{global_selector, set_global_selector};

use crate::error::Result;
use crate::node::{DoneFunc, Node};

/// 节点集合的更新切面，resolver 持有
pub trait Rebalancer: Send + Sync {
    /// 节点发生任何变化时，用全量列表替换内部集合
    fn apply(&self, nodes: Vec<Node>);
}

/// 负载均衡选择器
pub trait Selector: Rebalancer {
    /// 选出一个节点
    ///
    /// 成功时返回的节点与完成回调都不为空；
    /// 完成回调必须在 RPC 结束后恰好调用一次
    fn select(&self, opts: SelectOptions) -> Result<(Node, DoneFunc)>;
}

/// 选择器构建器
pub trait Builder: Send + Sync {
    fn build(&self) -> Arc<dyn Selector>;
}

/// 被选中节点的发布槽，供下游中间件观察
#[derive(Default)]
pub struct Peer {
    node: RwLock<Option<Node>>,
}

impl Peer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取已发布的节点
    pub fn node(&self) -> Option<Node> {
        self.node.read().clone()
    }

    pub(crate) fn set(&self, node: Node) {
        *self.node.write() = Some(node);
    }
}

/// select 的每次调用选项
#[derive(Default, Clone)]
pub struct SelectOptions {
    pub(crate) node_filters: Vec<NodeFilter>,
    pub(crate) peer: Option<Arc<Peer>>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个节点过滤器，按加入顺序执行
    pub fn with_node_filter(mut self, filter: NodeFilter) -> Self {
        self.node_filters.push(filter);
        self
    }

    /// 设置 peer 发布槽
    pub fn with_peer(mut self, peer: Arc<Peer>) -> Self {
        self.peer = Some(peer);
        self
    }
}

//! Flare 客户端负载均衡选择器核心库
//!
//! 将服务发现的实例快照流，转换为可并发查询的节点池，
//! 并在每次出站调用时按可插拔策略（random、wrr、p2c）选出一个节点。
//! 请求完成后通过 DoneFunc 将时延、错误等遥测回写到节点。

pub mod balancer;
pub mod error;
pub mod node;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod subset;

// Re-exports
pub use balancer::{Balancer, BalancerBuilder};
pub use error::{Result, SelectorError};
pub use node::{DoneFunc, DoneInfo, Node, ReplyMd, WeightedNode, WeightedNodeBuilder};
pub use registry::{Discovery, ServiceInstance, Watcher};
pub use resolver::{Resolver, ResolverOptions, Target};
pub use selector::{
    global_selector, set_global_selector, Builder, DefaultBuilder, DefaultSelector, NodeFilter,
    Peer, Rebalancer, SelectOptions, Selector,
};
pub use subset::subset;

//! 节点抽象
//!
//! Node 是服务节点的不可变标识；WeightedNode 在其上叠加单客户端视角的
//! 运行时遥测，由负载均衡器实时计算调度权重

pub mod direct;
pub mod ewma;

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::registry::ServiceInstance;

/// 纳秒时间戳（遥测统一使用）
pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// 服务节点的不可变标识
#[derive(Debug, Clone)]
pub struct Node {
    scheme: String,
    address: String,
    service_name: String,
    version: String,
    initial_weight: Option<i64>,
    metadata: HashMap<String, String>,
}

impl Node {
    /// 从服务发现的实例构建节点
    ///
    /// 初始权重取实例元数据中的 `weight`，解析失败视为未设置
    pub fn new(scheme: impl Into<String>, address: impl Into<String>, ins: &ServiceInstance) -> Self {
        let initial_weight = ins.metadata.get("weight").and_then(|w| w.parse::<i64>().ok());
        Self {
            scheme: scheme.into(),
            address: address.into(),
            service_name: ins.name.clone(),
            version: ins.version.clone(),
            initial_weight,
            metadata: ins.metadata.clone(),
        }
    }

    /// 构建一个没有注册实例背书的裸节点（直连场景）
    pub fn bare(scheme: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            address: address.into(),
            service_name: String::new(),
            version: String::new(),
            initial_weight: None,
            metadata: HashMap::new(),
        }
    }

    /// 节点协议
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// 同一服务下唯一的地址
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 服务名
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 服务版本
    pub fn version(&self) -> &str {
        &self.version
    }

    /// 初始调度权重，未设置时由策略取默认值
    pub fn initial_weight(&self) -> Option<i64> {
        self.initial_weight
    }

    /// 实例元数据
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

/// 应答元数据读取接口
pub trait ReplyMd: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// gRPC trailer 即应答元数据
impl ReplyMd for tonic::metadata::MetadataMap {
    fn get(&self, key: &str) -> Option<String> {
        tonic::metadata::MetadataMap::get(self, key)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

/// RPC 完成时传回的信息
#[derive(Default)]
pub struct DoneInfo {
    /// 应答错误
    pub err: Option<Box<dyn Error + Send + Sync>>,
    /// 应答元数据
    pub reply_md: Option<Box<dyn ReplyMd>>,
    /// 是否已向服务端发送过字节
    pub bytes_sent: bool,
    /// 是否已从服务端收到过字节
    pub bytes_received: bool,
}

/// RPC 完成回调，每次 pick 恰好调用一次
pub type DoneFunc = Box<dyn FnOnce(DoneInfo) + Send>;

/// 实时计算调度权重的节点
pub trait WeightedNode: Send + Sync {
    /// 返回原始节点
    fn raw(&self) -> &Node;

    /// 运行时权重，越高越优先
    fn weight(&self) -> f64;

    /// 负载均衡器选中当前节点后、请求开始前调用，
    /// 记录遥测起点并返回完成回调
    fn pick(&self) -> DoneFunc;

    /// 距最近一次被选中经过的时间
    fn pick_elapsed(&self) -> Duration;
}

/// 由 Node 构建 WeightedNode
pub trait WeightedNodeBuilder: Send + Sync {
    fn build(&self, node: Node) -> Arc<dyn WeightedNode>;
}

//! 注册中心边界
//!
//! 核心只消费这里的契约；具体后端（etcd、consul 等）由外部实现

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 服务实例
///
/// Endpoints 的格式：
///   http://127.0.0.1:8000?isSecure=false
///   grpc://127.0.0.1:9000?isSecure=false
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// 注册时的唯一实例 ID
    pub id: String,
    /// 注册时的服务名
    pub name: String,
    /// 服务版本
    pub version: String,
    /// 实例关联的 kv 元数据（version、namespace、region、protocol 等）
    pub metadata: HashMap<String, String>,
    /// 实例的所有 endpoint 地址
    pub endpoints: Vec<String>,
}

impl ServiceInstance {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// 设置版本
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 添加 endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.id)
    }
}

/// 等价性：id+name+version 一致，endpoints 与 metadata 按集合相等
impl PartialEq for ServiceInstance {
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id || self.name != other.name || self.version != other.version {
            return false;
        }
        if self.endpoints.len() != other.endpoints.len()
            || self.metadata.len() != other.metadata.len()
        {
            return false;
        }
        let mut lhs = self.endpoints.clone();
        let mut rhs = other.endpoints.clone();
        lhs.sort();
        rhs.sort();
        if lhs != rhs {
            return false;
        }
        self.metadata
            .iter()
            .all(|(k, v)| other.metadata.get(k) == Some(v))
    }
}

impl Eq for ServiceInstance {}

/// 服务发现接口（client 用）
#[async_trait]
pub trait Discovery: Send + Sync {
    /// 按服务名返回当前内存中的实例列表
    async fn get_service(&self, service_name: &str) -> Result<Vec<ServiceInstance>>;

    /// 按服务名创建一个 watcher
    async fn watch(&self, service_name: &str) -> Result<Box<dyn Watcher>>;
}

/// 服务变化监听器
///
/// 实现交付全量快照，而不是增量
#[async_trait]
pub trait Watcher: Send + Sync {
    /// 在以下两种情况返回：
    /// 1. 首次 watch 且实例列表非空
    /// 2. 实例列表发生任何变化
    /// 否则阻塞，直到取消（返回 `SelectorError::Canceled`）
    async fn next(&mut self) -> Result<Vec<ServiceInstance>>;

    /// 关闭 watcher，未决的 next 立即返回
    async fn stop(&mut self) -> Result<()>;
}

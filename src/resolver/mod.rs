//! 服务发现 resolver
//!
//! 订阅注册中心的实例快照，转换为负载均衡节点并写入选择器。
//! 后台任务对瞬时错误退避重试，对取消立即退出

pub mod endpoint;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, SelectorError};
use crate::node::Node;
use crate::registry::{Discovery, ServiceInstance, Watcher};
use crate::selector::Rebalancer;
use crate::subset::subset;

// 瞬时注册中心错误的重试间隔
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// 目标协议族
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Grpc,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Grpc => "grpc",
        }
    }
}

/// resolver 的目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: String,
    pub authority: String,
    pub endpoint: String,
}

impl Target {
    /// 解析目标地址
    ///
    /// 没有 scheme 的裸地址按 insecure 补上 http:// 或 https://；
    /// `discovery:///service-name` 形式的 path 部分是服务名
    pub fn parse(endpoint: &str, insecure: bool) -> Result<Target> {
        let raw = if endpoint.contains("://") {
            endpoint.to_string()
        } else if insecure {
            format!("http://{}", endpoint)
        } else {
            format!("https://{}", endpoint)
        };
        let url = Url::parse(&raw)
            .map_err(|e| SelectorError::invalid_endpoint(format!("{}: {}", endpoint, e)))?;
        let authority = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        let path = url.path();
        let endpoint = path.strip_prefix('/').unwrap_or(path).to_string();
        Ok(Target {
            scheme: url.scheme().to_string(),
            authority,
            endpoint,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.authority, self.endpoint)
    }
}

/// resolver 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// 阻塞等待首个非空节点集合
    pub block: bool,
    /// 使用非安全 scheme（http/grpc 而非 https/grpcs）
    pub insecure: bool,
    /// 目标协议族
    pub protocol: Protocol,
    /// 子集大小，0 表示不做子集
    pub subset_size: usize,
    /// 阻塞引导的最长等待时间，None 表示不限
    pub block_timeout: Option<Duration>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            block: false,
            insecure: false,
            protocol: Protocol::Http,
            subset_size: 0,
            block_timeout: None,
        }
    }
}

impl ResolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_subset_size(mut self, size: usize) -> Self {
        self.subset_size = size;
        self
    }

    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = Some(timeout);
        self
    }
}

struct ResolverInner {
    target: Target,
    rebalancer: Arc<dyn Rebalancer>,
    // 节点的协议族标签，如 http
    family: &'static str,
    // 匹配 endpoint 用的目标 scheme，如 https
    wanted_scheme: String,
    subset_size: usize,
    // 每个 resolver 固定的子集 key，保证分片稳定
    subset_key: String,
}

impl ResolverInner {
    /// 将实例快照转换为节点并写入选择器
    ///
    /// 结果为空时拒绝覆盖现有集合，返回 false 让引导继续等待
    fn update(&self, services: &[ServiceInstance]) -> bool {
        let mut filtered: Vec<ServiceInstance> = Vec::with_capacity(services.len());
        for ins in services {
            match endpoint::parse_endpoint(&ins.endpoints, &self.wanted_scheme) {
                Ok(Some(_)) => filtered.push(ins.clone()),
                Ok(None) => {
                    debug!(instance = %ins, "no matching endpoint for {}, skipped", self.target);
                }
                Err(err) => {
                    warn!(
                        instance = %ins,
                        error = %err,
                        "failed to parse discovery endpoint for {}",
                        self.target
                    );
                }
            }
        }
        if self.subset_size > 0 {
            filtered = subset(&self.subset_key, filtered, self.subset_size);
        }

        let mut nodes = Vec::with_capacity(filtered.len());
        for ins in &filtered {
            if let Ok(Some(address)) = endpoint::parse_endpoint(&ins.endpoints, &self.wanted_scheme)
            {
                nodes.push(Node::new(self.family, address, ins));
            }
        }
        if nodes.is_empty() {
            warn!("zero endpoint found, refused to write: {}", self.target);
            return false;
        }
        self.rebalancer.apply(nodes);
        true
    }
}

/// 服务发现 resolver
///
/// 构建后持续监听注册中心，直到 stop 或被丢弃
pub struct Resolver {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Resolver {
    pub async fn new(
        discovery: Arc<dyn Discovery>,
        target: Target,
        rebalancer: Arc<dyn Rebalancer>,
        opts: ResolverOptions,
    ) -> Result<Resolver> {
        let mut watcher = discovery.watch(&target.endpoint).await?;
        let inner = Arc::new(ResolverInner {
            wanted_scheme: endpoint::scheme(opts.protocol.as_str(), !opts.insecure),
            family: opts.protocol.as_str(),
            subset_size: opts.subset_size,
            subset_key: Uuid::new_v4().to_string(),
            rebalancer,
            target,
        });

        if opts.block {
            if let Err(err) = Self::bootstrap(&inner, &mut watcher, opts.block_timeout).await {
                error!(error = %err, "blocking bootstrap for {} failed", inner.target);
                if let Err(stop_err) = watcher.stop().await {
                    error!(error = %stop_err, "failed to stop watcher for {}", inner.target);
                }
                return Err(err);
            }
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task_inner = Arc::clone(&inner);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if let Err(err) = watcher.stop().await {
                            warn!(error = %err, "failed to stop watcher for {}", task_inner.target);
                        }
                        return;
                    }
                    next = watcher.next() => match next {
                        Ok(services) => {
                            task_inner.update(&services);
                        }
                        Err(err) if err.is_canceled() => return,
                        Err(err) => {
                            error!(
                                error = %err,
                                "watch service {} got unexpected error, retrying",
                                task_inner.target
                            );
                            tokio::time::sleep(RETRY_INTERVAL).await;
                        }
                    }
                }
            }
        });

        Ok(Resolver { shutdown, handle })
    }

    // 同步驱动 watcher，直到某次更新产生非空节点集合或超时
    async fn bootstrap(
        inner: &Arc<ResolverInner>,
        watcher: &mut Box<dyn Watcher>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let wait = async {
            loop {
                let services = watcher.next().await?;
                if inner.update(&services) {
                    return Ok(());
                }
            }
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, wait)
                .await
                .map_err(|_| SelectorError::Canceled)?,
            None => wait.await,
        }
    }

    /// 停止 resolver，立即解除未决的 next 阻塞
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

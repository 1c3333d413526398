//! Resolver 与子集测试
//!
//! 用内存 watcher 模拟注册中心：覆盖阻塞引导、空集合拒写、
//! 瞬时错误重试、取消退出，以及 endpoint/target 解析与子集确定性

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};

use flare_selector_core::balancer::{BalancerBuilder, RandomBalancerBuilder};
use flare_selector_core::node::direct::DirectNodeBuilder;
use flare_selector_core::resolver::{endpoint, Protocol, Resolver, ResolverOptions, Target};
use flare_selector_core::selector::{DefaultSelector, SelectOptions};
use flare_selector_core::{
    subset, Discovery, DoneInfo, Result, Selector, SelectorError, ServiceInstance, Watcher,
};

type Snapshot = Result<Vec<ServiceInstance>>;

struct MockWatcher {
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

#[async_trait]
impl Watcher for MockWatcher {
    async fn next(&mut self) -> Result<Vec<ServiceInstance>> {
        match self.rx.recv().await {
            Some(snapshot) => snapshot,
            None => Err(SelectorError::Canceled),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.rx.close();
        Ok(())
    }
}

struct MockDiscovery {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Snapshot>>>,
}

impl MockDiscovery {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<Snapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                rx: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn get_service(&self, _service_name: &str) -> Result<Vec<ServiceInstance>> {
        Ok(Vec::new())
    }

    async fn watch(&self, _service_name: &str) -> Result<Box<dyn Watcher>> {
        let rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| SelectorError::registry("watcher already taken"))?;
        Ok(Box::new(MockWatcher { rx }))
    }
}

fn http_instance(id: &str, host: &str) -> ServiceInstance {
    ServiceInstance::new(id, "demo.service")
        .with_version("v1")
        .with_endpoint(format!("http://{}", host))
}

fn grpc_only_instance(id: &str, host: &str) -> ServiceInstance {
    ServiceInstance::new(id, "demo.service")
        .with_version("v1")
        .with_endpoint(format!("grpc://{}", host))
}

fn make_selector() -> Arc<DefaultSelector> {
    Arc::new(DefaultSelector::new(
        Arc::new(DirectNodeBuilder),
        RandomBalancerBuilder.build(),
    ))
}

fn insecure_http_options() -> ResolverOptions {
    ResolverOptions::new()
        .with_protocol(Protocol::Http)
        .with_insecure(true)
}

#[tokio::test]
async fn cold_bootstrap_applies_first_snapshot() {
    let (discovery, tx) = MockDiscovery::new();
    let selector = make_selector();
    tx.send(Ok(vec![
        http_instance("a", "10.0.0.1:80"),
        http_instance("b", "10.0.0.2:80"),
    ]))
    .unwrap();

    let resolver = Resolver::new(
        discovery,
        Target::parse("discovery:///demo.service", true).unwrap(),
        selector.clone(),
        insecure_http_options()
            .with_block(true)
            .with_block_timeout(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    for _ in 0..10 {
        let (node, done) = selector.select(SelectOptions::new()).unwrap();
        assert!(matches!(node.address(), "10.0.0.1:80" | "10.0.0.2:80"));
        assert_eq!(node.service_name(), "demo.service");
        done(DoneInfo::default());
    }
    resolver.stop().await;
}

#[tokio::test]
async fn bootstrap_times_out_without_nodes() {
    let (discovery, _tx) = MockDiscovery::new();
    let selector = make_selector();

    let result = Resolver::new(
        discovery,
        Target::parse("discovery:///demo.service", true).unwrap(),
        selector,
        insecure_http_options()
            .with_block(true)
            .with_block_timeout(Duration::from_millis(200)),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn empty_effective_set_is_rejected() {
    let (discovery, tx) = MockDiscovery::new();
    let selector = make_selector();
    tx.send(Ok(vec![http_instance("a", "10.0.0.1:80")])).unwrap();

    let resolver = Resolver::new(
        discovery,
        Target::parse("discovery:///demo.service", true).unwrap(),
        selector.clone(),
        insecure_http_options()
            .with_block(true)
            .with_block_timeout(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    // 新快照里没有任何 http endpoint：拒绝覆盖现有集合
    tx.send(Ok(vec![grpc_only_instance("c", "10.0.0.9:90")]))
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    for _ in 0..10 {
        let (node, done) = selector.select(SelectOptions::new()).unwrap();
        assert_eq!(node.address(), "10.0.0.1:80");
        done(DoneInfo::default());
    }
    resolver.stop().await;
}

#[tokio::test]
async fn snapshot_shrink_is_applied() {
    let (discovery, tx) = MockDiscovery::new();
    let selector = make_selector();
    tx.send(Ok(vec![
        http_instance("a", "10.0.0.1:80"),
        http_instance("b", "10.0.0.2:80"),
        http_instance("c", "10.0.0.3:80"),
    ]))
    .unwrap();

    let resolver = Resolver::new(
        discovery,
        Target::parse("discovery:///demo.service", true).unwrap(),
        selector.clone(),
        insecure_http_options()
            .with_block(true)
            .with_block_timeout(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    tx.send(Ok(vec![http_instance("a", "10.0.0.1:80")])).unwrap();
    sleep(Duration::from_millis(100)).await;

    for _ in 0..20 {
        let (node, done) = selector.select(SelectOptions::new()).unwrap();
        assert_eq!(node.address(), "10.0.0.1:80");
        done(DoneInfo::default());
    }
    resolver.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_watch_error_is_retried() {
    let (discovery, tx) = MockDiscovery::new();
    let selector = make_selector();

    tx.send(Err(SelectorError::registry("etcd hiccup"))).unwrap();
    tx.send(Ok(vec![http_instance("a", "10.0.0.1:80")])).unwrap();

    let resolver = Resolver::new(
        discovery,
        Target::parse("discovery:///demo.service", true).unwrap(),
        selector.clone(),
        insecure_http_options(),
    )
    .await
    .unwrap();

    // 1s 退避后重新 next 并应用快照
    sleep(Duration::from_millis(1500)).await;
    let (node, done) = selector.select(SelectOptions::new()).unwrap();
    assert_eq!(node.address(), "10.0.0.1:80");
    done(DoneInfo::default());
    resolver.stop().await;
}

#[tokio::test]
async fn stop_unblocks_pending_next() {
    let (discovery, _tx) = MockDiscovery::new();
    let selector = make_selector();

    let resolver = Resolver::new(
        discovery,
        Target::parse("discovery:///demo.service", true).unwrap(),
        selector,
        insecure_http_options(),
    )
    .await
    .unwrap();

    timeout(Duration::from_secs(1), resolver.stop())
        .await
        .expect("stop should not hang");
}

#[test]
fn subset_is_deterministic_over_multisets() {
    let build = |order: &[usize]| -> Vec<ServiceInstance> {
        order
            .iter()
            .map(|i| http_instance(&format!("node-{}", i), &format!("10.0.0.{}:80", i)))
            .collect()
    };
    let forward = build(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    let shuffled = build(&[7, 3, 9, 0, 5, 1, 8, 2, 6, 4]);

    let a = subset("client-1", forward.clone(), 3);
    let b = subset("client-1", shuffled, 3);
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);

    // 实例数不超过子集大小时原样返回
    let small = build(&[1, 2]);
    assert_eq!(subset("client-1", small.clone(), 3), small);
}

#[test]
fn subset_varies_by_client_key() {
    let instances: Vec<ServiceInstance> = (0..20)
        .map(|i| http_instance(&format!("node-{}", i), &format!("10.0.0.{}:80", i)))
        .collect();

    let picked: Vec<_> = (0..16)
        .map(|i| subset(&format!("client-{}", i), instances.clone(), 4))
        .collect();
    // 不要求两两不同，但所有客户端拿到完全相同分片的概率可以忽略
    assert!(picked.iter().any(|p| p != &picked[0]));
}

#[test]
fn endpoint_scheme_matching() {
    let endpoints = vec![
        "grpc://10.0.0.1:9000".to_string(),
        "http://10.0.0.1:8000".to_string(),
    ];
    assert_eq!(
        endpoint::parse_endpoint(&endpoints, "http").unwrap(),
        Some("10.0.0.1:8000".to_string())
    );
    assert_eq!(
        endpoint::parse_endpoint(&endpoints, "grpc").unwrap(),
        Some("10.0.0.1:9000".to_string())
    );
    assert_eq!(endpoint::parse_endpoint(&endpoints, "https").unwrap(), None);

    // 旧格式：isSecure=true 等价于安全 scheme
    let legacy = vec!["http://10.0.0.1:8000?isSecure=true".to_string()];
    assert_eq!(
        endpoint::parse_endpoint(&legacy, "https").unwrap(),
        Some("10.0.0.1:8000".to_string())
    );

    assert!(endpoint::parse_endpoint(&["not a url".to_string()], "http").is_err());
}

#[test]
fn target_parsing_defaults_scheme() {
    let target = Target::parse("discovery:///demo.service", true).unwrap();
    assert_eq!(target.scheme, "discovery");
    assert_eq!(target.endpoint, "demo.service");

    let target = Target::parse("127.0.0.1:8000", true).unwrap();
    assert_eq!(target.scheme, "http");
    assert_eq!(target.authority, "127.0.0.1:8000");

    let target = Target::parse("127.0.0.1:8000", false).unwrap();
    assert_eq!(target.scheme, "https");
}

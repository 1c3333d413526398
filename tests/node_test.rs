//! 节点公共 API 测试
//!
//! 覆盖 Node 的构建与元数据、direct 节点的固定权重行为

use std::collections::HashMap;
use std::time::Duration;

use flare_selector_core::node::direct::DirectNodeBuilder;
use flare_selector_core::{DoneInfo, Node, ServiceInstance, WeightedNode, WeightedNodeBuilder};

fn instance_with_weight(weight: Option<&str>) -> ServiceInstance {
    let mut ins = ServiceInstance::new("node-1", "demo.service")
        .with_version("v1.0.0")
        .with_endpoint("http://127.0.0.1:9000")
        .with_metadata("region", "sh");
    if let Some(w) = weight {
        ins = ins.with_metadata("weight", w);
    }
    ins
}

#[test]
fn node_carries_instance_identity() {
    let ins = instance_with_weight(Some("200"));
    let node = Node::new("http", "127.0.0.1:9000", &ins);

    assert_eq!(node.scheme(), "http");
    assert_eq!(node.address(), "127.0.0.1:9000");
    assert_eq!(node.service_name(), "demo.service");
    assert_eq!(node.version(), "v1.0.0");
    assert_eq!(node.initial_weight(), Some(200));
    assert_eq!(node.metadata().get("region").map(String::as_str), Some("sh"));
}

#[test]
fn invalid_weight_metadata_is_ignored() {
    let ins = instance_with_weight(Some("not-a-number"));
    let node = Node::new("http", "127.0.0.1:9000", &ins);
    assert_eq!(node.initial_weight(), None);
}

#[test]
fn direct_weight_is_static() {
    let builder = DirectNodeBuilder;

    let ins = instance_with_weight(Some("200"));
    let weighted = builder.build(Node::new("http", "127.0.0.1:9000", &ins));
    assert_eq!(weighted.weight(), 200.0);

    // 任意调用历史都不改变权重
    for _ in 0..10 {
        let done = weighted.pick();
        done(DoneInfo::default());
    }
    assert_eq!(weighted.weight(), 200.0);

    let ins = instance_with_weight(None);
    let weighted = builder.build(Node::new("http", "127.0.0.1:9001", &ins));
    assert_eq!(weighted.weight(), 100.0);
}

#[test]
fn direct_pick_refreshes_elapsed() {
    let builder = DirectNodeBuilder;
    let ins = instance_with_weight(None);
    let weighted = builder.build(Node::new("http", "127.0.0.1:9000", &ins));

    // 从未被选中：经过时间巨大
    assert!(weighted.pick_elapsed() > Duration::from_secs(3));

    let done = weighted.pick();
    assert!(weighted.pick_elapsed() < Duration::from_secs(1));
    done(DoneInfo::default());
}

#[test]
fn instance_equality_ignores_ordering() {
    let a = ServiceInstance {
        id: "node-1".to_string(),
        name: "demo.service".to_string(),
        version: "v1".to_string(),
        metadata: HashMap::from([
            ("region".to_string(), "sh".to_string()),
            ("zone".to_string(), "sh-a".to_string()),
        ]),
        endpoints: vec![
            "http://127.0.0.1:8000".to_string(),
            "grpc://127.0.0.1:9000".to_string(),
        ],
    };
    let mut b = a.clone();
    b.endpoints.reverse();
    assert_eq!(a, b);

    b.version = "v2".to_string();
    assert_ne!(a, b);
}

//! 确定性子集
//!
//! 大规模实例列表按客户端分片，降低单客户端的连接扇出。
//! 同一客户端 key 加同一实例多重集，得到同一子集：
//! 先按实例 id 排序消除输入顺序差异，再用 key 派生的种子洗牌，
//! 最后按 key 取对应窗口

use std::hash::{DefaultHasher, Hash, Hasher};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::registry::ServiceInstance;

/// 从实例列表中取出该客户端的子集
///
/// `size` 为 0 或实例数不超过 `size` 时原样返回
pub fn subset(client_key: &str, mut instances: Vec<ServiceInstance>, size: usize) -> Vec<ServiceInstance> {
    if size == 0 || instances.len() <= size {
        return instances;
    }
    instances.sort_by(|a, b| a.id.cmp(&b.id));

    let count = (instances.len() / size) as u64;
    let mut hasher = DefaultHasher::new();
    client_key.hash(&mut hasher);
    let id = hasher.finish();

    let round = id / count;
    let mut rng = StdRng::seed_from_u64(round);
    instances.shuffle(&mut rng);

    let start = (id % count) as usize * size;
    instances.into_iter().skip(start).take(size).collect()
}

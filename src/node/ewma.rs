//! 自适应遥测节点
//!
//! 对请求时延与成功率分别做 EWMA，衰减系数随完成节奏变化；
//! 另带一个堆积预测器：在途请求中过半数超过平均时延时抬高负载，
//! 提前避开疑似卡死的节点

use std::error::Error;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tonic::Code;

use super::{now_nanos, DoneFunc, DoneInfo, Node, WeightedNode, WeightedNodeBuilder};

// `lag` 的平均寿命，经过 tau*ln(2) 衰减到一半
const TAU: i64 = Duration::from_millis(600).as_nanos() as i64;
// 冷节点没有统计数据时的惩罚负载
const PENALTY: u64 = Duration::from_secs(10).as_nanos() as u64;

const PREDICT_INTERVAL_MIN: i64 = Duration::from_millis(5).as_nanos() as i64;
const PREDICT_INTERVAL_MAX: i64 = Duration::from_millis(200).as_nanos() as i64;

/// 错误分类器：返回 true 表示该错误计为一次失败
pub type ErrClassifier = Arc<dyn Fn(&(dyn Error + Send + Sync)) -> bool + Send + Sync>;

/// 在途请求的起始时间戳集合，按句柄删除
#[derive(Default)]
struct Inflights {
    entries: Vec<(u64, i64)>,
    next_id: u64,
}

impl Inflights {
    fn push(&mut self, start: i64) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push((id, start));
        id
    }

    fn remove(&mut self, id: u64) -> Option<i64> {
        let pos = self.entries.iter().position(|&(eid, _)| eid == id)?;
        Some(self.entries.swap_remove(pos).1)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn starts(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|&(_, start)| start)
    }
}

/// 单客户端视角的节点遥测
struct EwmaState {
    // 请求时延的 EWMA，纳秒
    lag: AtomicI64,
    // 成功率的 EWMA，[0, 1000]
    success: AtomicU64,
    // 当前客户端经由该节点发出、尚未完成的请求数
    inflight: AtomicI64,
    inflights: RwLock<Inflights>,
    // 最近一次完成回调的时间戳
    stamp: AtomicI64,
    predict_ts: AtomicI64,
    predict: AtomicI64,
    // pick 次数的单调计数
    reqs: AtomicI64,
    // 最近一次被选中的时间戳
    last_pick: AtomicI64,

    err_handler: Option<ErrClassifier>,
}

impl EwmaState {
    fn health(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    fn load(&self) -> u64 {
        let now = now_nanos();
        let avg_lag = self.lag.load(Ordering::Relaxed);
        let last_predict_ts = self.predict_ts.load(Ordering::Acquire);
        let predict_interval = (avg_lag / 5).clamp(PREDICT_INTERVAL_MIN, PREDICT_INTERVAL_MAX);
        // 扫描由 CAS 串行化，同一时刻只有一个线程在做预测
        if now - last_predict_ts > predict_interval
            && self
                .predict_ts
                .compare_exchange(last_predict_ts, now, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            let mut total: i64 = 0;
            let mut count: usize = 0;
            let inflights = self.inflights.read();
            for start in inflights.starts() {
                let lag = now - start;
                if lag > avg_lag {
                    count += 1;
                    total += lag;
                }
            }
            let predict = if count > inflights.len() / 2 + 1 {
                total / count as i64
            } else {
                0
            };
            drop(inflights);
            self.predict.store(predict, Ordering::Relaxed);
        }

        let inflight = self.inflight.load(Ordering::Relaxed).max(0) as u64;
        if avg_lag == 0 {
            return PENALTY * inflight;
        }
        let predict = self.predict.load(Ordering::Relaxed);
        avg_lag.max(predict) as u64 * inflight
    }

    fn done(&self, handle: u64, di: DoneInfo) {
        let start = self.inflights.write().remove(handle);
        self.inflight.fetch_sub(1, Ordering::Relaxed);

        let now = now_nanos();
        let stamp = self.stamp.swap(now, Ordering::Relaxed);
        let td = (now - stamp).max(0);
        let mut w = (-(td as f64) / TAU as f64).exp();

        let raw_lag = start.map(|s| (now - s).max(0)).unwrap_or(0);
        let old_lag = self.lag.load(Ordering::Relaxed);
        if old_lag == 0 {
            // 首个样本直接采纳
            w = 0.0;
        }
        let lag = (old_lag as f64 * w + raw_lag as f64 * (1.0 - w)).round() as i64;
        self.lag.store(lag, Ordering::Relaxed);

        let mut sample: u64 = 1000;
        if let Some(err) = di.err.as_ref() {
            let err = err.as_ref();
            if let Some(handler) = &self.err_handler {
                if handler(err) {
                    sample = 0;
                }
            }
            if is_fatal(err) {
                sample = 0;
            }
        }
        let old_success = self.success.load(Ordering::Relaxed);
        let success = (old_success as f64 * w + sample as f64 * (1.0 - w)).round() as u64;
        self.success.store(success, Ordering::Relaxed);
    }
}

/// 默认分类：超时/取消、服务不可用、以及传输层网络错误计为失败
fn is_fatal(err: &(dyn Error + Send + Sync + 'static)) -> bool {
    if let Some(status) = err.downcast_ref::<tonic::Status>() {
        return matches!(
            status.code(),
            Code::Cancelled | Code::DeadlineExceeded | Code::Unavailable
        );
    }
    let mut source: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.downcast_ref::<std::io::Error>().is_some() {
            return true;
        }
        source = e.source();
    }
    false
}

/// EWMA 节点
pub struct EwmaNode {
    node: Node,
    state: Arc<EwmaState>,
}

/// EWMA 节点构建器
#[derive(Default, Clone)]
pub struct EwmaNodeBuilder {
    err_handler: Option<ErrClassifier>,
    inflight_bias: Option<i64>,
}

impl EwmaNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置业务错误分类器，优先于默认分类
    pub fn with_error_handler(mut self, handler: ErrClassifier) -> Self {
        self.err_handler = Some(handler);
        self
    }

    /// 设置 inflight 的初始偏置
    ///
    /// 偏置抬高冷节点的起始负载，同时避免负载为零；默认 1
    pub fn with_inflight_bias(mut self, bias: i64) -> Self {
        self.inflight_bias = Some(bias);
        self
    }

    fn build_node(&self, node: Node) -> EwmaNode {
        EwmaNode {
            node,
            state: Arc::new(EwmaState {
                lag: AtomicI64::new(0),
                success: AtomicU64::new(1000),
                inflight: AtomicI64::new(self.inflight_bias.unwrap_or(1)),
                inflights: RwLock::new(Inflights::default()),
                stamp: AtomicI64::new(0),
                predict_ts: AtomicI64::new(0),
                predict: AtomicI64::new(0),
                reqs: AtomicI64::new(0),
                last_pick: AtomicI64::new(0),
                err_handler: self.err_handler.clone(),
            }),
        }
    }
}

impl WeightedNodeBuilder for EwmaNodeBuilder {
    fn build(&self, node: Node) -> Arc<dyn WeightedNode> {
        Arc::new(self.build_node(node))
    }
}

impl WeightedNode for EwmaNode {
    fn raw(&self) -> &Node {
        &self.node
    }

    fn weight(&self) -> f64 {
        self.state.health() as f64 * 1e9 / self.state.load() as f64
    }

    fn pick(&self) -> DoneFunc {
        let now = now_nanos();
        self.state.last_pick.store(now, Ordering::Relaxed);
        self.state.inflight.fetch_add(1, Ordering::Relaxed);
        self.state.reqs.fetch_add(1, Ordering::Relaxed);
        let handle = self.state.inflights.write().push(now);

        let state = Arc::clone(&self.state);
        Box::new(move |di| state.done(handle, di))
    }

    fn pick_elapsed(&self) -> Duration {
        let elapsed = now_nanos() - self.state.last_pick.load(Ordering::Relaxed);
        Duration::from_nanos(elapsed.max(0) as u64)
    }
}

//! EWMA 自适应节点
//!
//! 对每个节点维护指数加权移动平均的延迟（`lag`）与健康分（`success`），
//! 结合当前并发数估算负载：
//!
//! ```text
//! w       = exp(-Δt / tau)            // 第一个样本时 w = 0
//! lag     = lag * w + sample * (1 - w)
//! success = success * w + {1000 | 0} * (1 - w)
//! load    = max(lag, predict) * (inflight + 1)   // 无历史时 lag 取 penalty
//! weight  = success * 1e9 / load
//! ```
//!
//! `predict` 用于在调用返回之前发现节点变慢：如果超过一半的在途调用已经
//! 超过平均延迟，就取这些超时调用的平均耗时作为预测延迟

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::config::EwmaConfig;
use crate::error::is_node_failure;
use crate::selector::{DoneFunc, DoneInfo, Node, WeightedNode, WeightedNodeBuilder};
use crate::utils::clock::duration_nanos;
use crate::utils::{Clock, SystemClock};

/// 健康分上限
pub const SUCCESS_MAX: u64 = 1000;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const PREDICT_INTERVAL_MIN: i64 = 5_000_000;
const PREDICT_INTERVAL_MAX: i64 = 200_000_000;

/// 调用方提供的错误分类器，返回 true 表示该错误应降低节点健康分
pub type ErrorHandler = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

#[derive(Clone)]
struct EwmaParams {
    tau: i64,
    penalty: u64,
    err_handler: Option<ErrorHandler>,
    clock: Arc<dyn Clock>,
}

impl EwmaParams {
    fn is_failure(&self, err: &(dyn StdError + 'static)) -> bool {
        self.err_handler.as_ref().is_some_and(|handler| handler(err)) || is_node_failure(err)
    }
}

/// 节点运行时统计，跨代复用时在新旧包装之间共享
#[derive(Default)]
struct EwmaState {
    /// 平均延迟（纳秒）
    lag: AtomicI64,
    /// 健康分 [0, 1000]
    success: AtomicU64,
    /// 在途调用数
    inflight: AtomicI64,
    /// 在途调用开始时间，按 pick 顺序排列
    inflights: Mutex<BTreeMap<u64, i64>>,
    next_ticket: AtomicU64,
    /// 已完成的调用样本数
    samples: AtomicU64,
    /// 上次衰减更新时间
    stamp: AtomicI64,
    reqs: AtomicI64,
    last_pick: AtomicI64,
    predict_ts: AtomicI64,
    predict: AtomicI64,
}

impl EwmaState {
    fn new() -> Self {
        Self {
            success: AtomicU64::new(SUCCESS_MAX),
            ..Default::default()
        }
    }

    fn complete(&self, params: &EwmaParams, ticket: u64, start: i64, info: &DoneInfo) {
        self.inflights.lock().remove(&ticket);
        self.inflight.fetch_sub(1, Ordering::AcqRel);

        let now = params.clock.now_nanos();
        let stamp = self.stamp.swap(now, Ordering::AcqRel);
        let td = (now - stamp).max(0);
        let mut w = (-(td as f64) / params.tau as f64).exp();
        if self.samples.load(Ordering::Acquire) == 0 {
            // 第一个样本直接替换初始值
            w = 0.0;
        }

        let sample_lag = (now - start).max(0);
        let old_lag = self.lag.load(Ordering::Acquire);
        let lag = old_lag as f64 * w + sample_lag as f64 * (1.0 - w);
        self.lag.store(lag.round() as i64, Ordering::Release);

        let sample_success = match info.err.as_deref() {
            Some(err) if params.is_failure(err) => 0,
            _ => SUCCESS_MAX,
        };
        let old_success = self.success.load(Ordering::Acquire);
        let success = old_success as f64 * w + sample_success as f64 * (1.0 - w);
        self.success
            .store((success.round() as u64).min(SUCCESS_MAX), Ordering::Release);
        // lag 与 success 写入后才计入样本，load 不会读到未写入的 lag
        self.samples.fetch_add(1, Ordering::AcqRel);
    }

    /// 重新计算预测延迟，同一时间窗口内只有一个线程执行
    fn refresh_predict(&self, now: i64, avg_lag: i64) {
        let last = self.predict_ts.load(Ordering::Acquire);
        let interval = (avg_lag / 5).clamp(PREDICT_INTERVAL_MIN, PREDICT_INTERVAL_MAX);
        if now - last <= interval
            || self
                .predict_ts
                .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return;
        }

        let predict = {
            let inflights = self.inflights.lock();
            let mut total = 0i64;
            let mut overdue = 0usize;
            for &start in inflights.values() {
                let elapsed = now - start;
                if elapsed > avg_lag {
                    overdue += 1;
                    total = total.saturating_add(elapsed);
                }
            }
            if overdue * 2 > inflights.len() {
                total / overdue as i64
            } else {
                0
            }
        };
        self.predict.store(predict, Ordering::Release);
    }
}

/// EWMA 自适应节点
pub struct EwmaNode {
    node: Node,
    state: Arc<EwmaState>,
    params: Arc<EwmaParams>,
}

impl EwmaNode {
    /// 平均延迟
    pub fn lag(&self) -> Duration {
        Duration::from_nanos(self.state.lag.load(Ordering::Acquire).max(0) as u64)
    }

    /// 健康分 [0, 1000]
    pub fn success(&self) -> u64 {
        self.state.success.load(Ordering::Acquire)
    }

    /// 在途调用数
    pub fn inflight(&self) -> i64 {
        self.state.inflight.load(Ordering::Acquire)
    }

    /// 最近一次计算的预测延迟
    pub fn predict(&self) -> Duration {
        Duration::from_nanos(self.state.predict.load(Ordering::Acquire).max(0) as u64)
    }

    /// 累计被选中次数
    pub fn requests(&self) -> i64 {
        self.state.reqs.load(Ordering::Relaxed)
    }

    /// 当前负载估计（纳秒）
    pub fn load(&self) -> u64 {
        let now = self.params.clock.now_nanos();
        let avg_lag = self.state.lag.load(Ordering::Acquire);
        self.state.refresh_predict(now, avg_lag);

        let concurrency = self.state.inflight.load(Ordering::Acquire).max(0) as u64 + 1;
        if self.state.samples.load(Ordering::Acquire) == 0 {
            // 刚启动的节点没有统计数据，给一个较大但有限的惩罚
            return self.params.penalty.saturating_mul(concurrency);
        }
        let lag = avg_lag.max(self.state.predict.load(Ordering::Acquire)).max(0) as u64;
        lag.saturating_mul(concurrency)
    }
}

impl WeightedNode for EwmaNode {
    fn raw(&self) -> &Node {
        &self.node
    }

    /// 负载为 0 时按 1ns 计算，即该健康分下的最大权重
    fn weight(&self) -> f64 {
        let load = self.load().max(1);
        self.success() as f64 * NANOS_PER_SECOND / load as f64
    }

    fn pick(&self) -> DoneFunc {
        let start = self.params.clock.now_nanos();
        self.state.last_pick.store(start, Ordering::Release);
        self.state.inflight.fetch_add(1, Ordering::AcqRel);
        self.state.reqs.fetch_add(1, Ordering::Relaxed);
        let ticket = self.state.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.state.inflights.lock().insert(ticket, start);

        let state = Arc::clone(&self.state);
        let params = Arc::clone(&self.params);
        let address = self.node.address().to_string();
        let finished = AtomicBool::new(false);
        DoneFunc::new(move |_ctx, info| {
            if finished.swap(true, Ordering::AcqRel) {
                trace!(address = %address, "Done callback invoked more than once, ignored");
                return;
            }
            state.complete(&params, ticket, start, &info);
        })
    }

    fn pick_elapsed(&self) -> Duration {
        let elapsed = self.params.clock.now_nanos() - self.state.last_pick.load(Ordering::Acquire);
        Duration::from_nanos(elapsed.max(0) as u64)
    }

    fn rebind(&self, node: Node) -> Arc<dyn WeightedNode> {
        Arc::new(Self {
            node,
            state: Arc::clone(&self.state),
            params: Arc::clone(&self.params),
        })
    }
}

impl fmt::Debug for EwmaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EwmaNode")
            .field("node", &self.node)
            .field("lag", &self.lag())
            .field("success", &self.success())
            .field("inflight", &self.inflight())
            .finish()
    }
}

/// EWMA 节点构建器
#[derive(Clone)]
pub struct EwmaNodeBuilder {
    params: Arc<EwmaParams>,
}

impl EwmaNodeBuilder {
    /// 默认参数：tau = 600ms，penalty = 10s
    pub fn new() -> Self {
        Self::from_config(&EwmaConfig::default())
    }

    pub fn from_config(config: &EwmaConfig) -> Self {
        Self {
            params: Arc::new(EwmaParams {
                tau: duration_nanos(config.tau()).max(1),
                penalty: duration_nanos(config.penalty()).max(0) as u64,
                err_handler: None,
                clock: Arc::new(SystemClock),
            }),
        }
    }

    /// 设置错误分类器
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.params).err_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_tau(mut self, tau: Duration) -> Self {
        Arc::make_mut(&mut self.params).tau = duration_nanos(tau).max(1);
        self
    }

    pub fn with_penalty(mut self, penalty: Duration) -> Self {
        Arc::make_mut(&mut self.params).penalty = duration_nanos(penalty).max(0) as u64;
        self
    }

    /// 替换时钟（测试使用）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        Arc::make_mut(&mut self.params).clock = clock;
        self
    }

    /// 构建具体类型的节点
    pub fn build_node(&self, node: Node) -> Arc<EwmaNode> {
        Arc::new(EwmaNode {
            node,
            state: Arc::new(EwmaState::new()),
            params: Arc::clone(&self.params),
        })
    }
}

impl Default for EwmaNodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightedNodeBuilder for EwmaNodeBuilder {
    fn build(&self, node: Node) -> Arc<dyn WeightedNode> {
        self.build_node(node)
    }
}

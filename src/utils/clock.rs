//! 时钟抽象
//!
//! EWMA 节点与 P2C 均衡器通过 `Clock` 获取单调时间，
//! 测试中可替换为 `ManualClock` 精确控制时间推进

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// 单调时钟，返回纳秒
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_nanos(&self) -> i64;
}

/// 基于 `Instant` 的系统单调时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let elapsed = EPOCH.get_or_init(Instant::now).elapsed();
        i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX)
    }
}

/// 手动推进的时钟
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// 从指定时刻开始
    pub fn new(start: Duration) -> Self {
        Self {
            now: AtomicI64::new(duration_nanos(start)),
        }
    }

    /// 时间前进 `d`
    pub fn advance(&self, d: Duration) {
        self.now.fetch_add(duration_nanos(d), Ordering::SeqCst);
    }

    /// 直接设置当前时刻
    pub fn set(&self, at: Duration) {
        self.now.store(duration_nanos(at), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// `Duration` 转为纳秒，溢出时饱和
pub(crate) fn duration_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 单调毫秒时钟
//!
//! 硬件定时器的发现与校准不在本核心内；这里只消费一个单调的毫秒时间源。

use core::sync::atomic::{AtomicU64, Ordering};

/// 毫秒时间戳
pub type Millis = u64;

/// 单调时钟源
pub trait Clock: Send + Sync {
    /// 当前时间（毫秒，单调不减）
    fn now_ms(&self) -> Millis;
}

/// 由定时器中断推进的滴答时钟
///
/// 类似 Linux 的 jiffies：中断处理程序调用 `advance()`，其余代码只读。
pub struct TickClock {
    now: AtomicU64,
}

impl TickClock {
    pub const fn new(start_ms: Millis) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// 时钟前进 `ms` 毫秒
    pub fn advance(&self, ms: Millis) {
        self.now.fetch_add(ms, Ordering::AcqRel);
    }

    /// 直接设置时间；倒退的值被忽略以保持单调
    pub fn set(&self, ms: Millis) {
        self.now.fetch_max(ms, Ordering::AcqRel);
    }
}

impl Clock for TickClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::Acquire)
    }
}

/// 计算截止时间，`timeout_ms` 溢出时饱和
#[inline]
pub fn deadline_after(now: Millis, timeout_ms: Millis) -> Millis {
    now.saturating_add(timeout_ms)
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! Futex (Fast Userspace Mutex)
//!
//! 对应 Linux 的 kernel/futex/，只实现 FUTEX_WAIT / FUTEX_WAKE。
//!
//! 等待者按 `(addr >> 3) % FUTEX_HASH_SIZE` 散列到独立加锁的桶里，
//! 新等待者插到桶头，唤醒从桶尾（最早入队）开始扫描。
//!
//! 锁顺序：桶锁 → 内核锁。
//! - wait 在桶锁内读取并比较用户内存、入队，并在同一临界区内
//!   （再取内核锁）把进程置为 Blocked，wake 无法插进检查与入队之间
//! - wake 在桶锁内摘下等待节点，仍持有桶锁时取内核锁把进程置为 Runnable
//! - 所有 `status` 修改都在内核锁下完成

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use log::debug;
use spin::{Mutex, MutexGuard};

use crate::config::FUTEX_HASH_SIZE;
use crate::errno::{Errno, KResult};
use crate::kernel::KernelState;
use crate::mm::UserAccess;
use crate::process::{Pid, ProcStatus};

/// FUTEX_WAIT
pub const FUTEX_WAIT: usize = 0;
/// FUTEX_WAKE
pub const FUTEX_WAKE: usize = 1;

/// 桶下标（8 字节粒度，同一 8 字节内的地址共享桶）
#[inline]
pub const fn futex_hash(addr: usize) -> usize {
    (addr >> 3) % FUTEX_HASH_SIZE
}

/// 等待节点
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct FutexWaiter {
    pid: Pid,
    addr: usize,
}

type Bucket = VecDeque<FutexWaiter>;

/// Futex 散列表
pub struct FutexTable {
    buckets: Box<[Mutex<Bucket>]>,
}

impl FutexTable {
    pub fn new() -> Self {
        let buckets = (0..FUTEX_HASH_SIZE)
            .map(|_| Mutex::new(VecDeque::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { buckets }
    }

    fn bucket(&self, addr: usize) -> MutexGuard<'_, Bucket> {
        self.buckets[futex_hash(addr)].lock()
    }

    /// FUTEX_WAIT
    ///
    /// `addr` 处的值等于 `expected` 时把 `pid` 挂入等待队列并置为 Blocked，
    /// 调用者随后应调度；被唤醒时系统调用返回 0。
    /// 值不相等返回 `EAGAIN`，地址未映射返回 `EFAULT`，未对齐返回 `EINVAL`。
    pub fn wait(
        &self,
        state: &Mutex<KernelState>,
        pid: Pid,
        addr: usize,
        expected: u32,
    ) -> KResult<()> {
        if addr % 4 != 0 {
            return Err(Errno::InvalidArgument);
        }

        let mut bucket = self.bucket(addr);
        let mut ks = state.lock();
        let proc = ks.procs.lookup_mut(pid)?;
        debug_assert!(proc.futex_wait.is_none());

        let current = UserAccess::enter(&mut *proc.space).read_u32(addr)?;
        if current != expected {
            return Err(Errno::WOULD_BLOCK);
        }

        bucket.push_front(FutexWaiter { pid, addr });
        proc.futex_wait = Some(addr);
        proc.status = ProcStatus::Blocked;
        proc.tf.set_return(0);
        debug!(target: "futex", "{} waits on {:#x} (val {})", pid, addr, expected);
        Ok(())
    }

    /// FUTEX_WAKE：按入队顺序唤醒至多 `max` 个等待 `addr` 的进程
    ///
    /// 不读取用户内存。返回唤醒的数量。
    /// 正在销毁的进程的节点被摘掉但不计数，扫描继续到唤醒 `max` 个存活的等待者。
    pub fn wake(&self, state: &Mutex<KernelState>, addr: usize, max: usize) -> usize {
        if max == 0 {
            return 0;
        }

        let mut bucket = self.bucket(addr);
        // 第一次匹配时才取内核锁
        let mut ks: Option<MutexGuard<'_, KernelState>> = None;
        let mut woken = 0;
        let mut index = bucket.len();
        while index > 0 && woken < max {
            index -= 1;
            if bucket[index].addr != addr {
                continue;
            }
            let Some(waiter) = bucket.remove(index) else {
                continue;
            };
            let guard = ks.get_or_insert_with(|| state.lock());
            let Some(proc) = guard.procs.get_mut(waiter.pid) else {
                continue;
            };
            proc.futex_wait = None;
            if proc.status == ProcStatus::Blocked {
                proc.status = ProcStatus::Runnable;
                woken += 1;
            } else {
                debug!(target: "futex", "dropped waiter {} ({:?})", waiter.pid, proc.status);
            }
        }
        drop(ks);
        drop(bucket);

        if woken > 0 {
            debug!(target: "futex", "woke {} waiter(s) on {:#x}", woken, addr);
        }
        woken
    }

    /// 摘下 `pid` 在 `addr` 上的等待节点；节点已被 wake 摘走时返回 false
    pub fn unlink(&self, pid: Pid, addr: usize) -> bool {
        let mut bucket = self.bucket(addr);
        match bucket.iter().position(|w| w.pid == pid) {
            Some(index) => {
                bucket.remove(index);
                true
            }
            None => false,
        }
    }

    /// 等待 `addr` 的进程数
    pub fn waiters(&self, addr: usize) -> usize {
        self.bucket(addr).iter().filter(|w| w.addr == addr).count()
    }

    /// 所有桶中的等待节点总数
    pub fn total_waiters(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().len()).sum()
    }

    /// `pid` 是否仍有等待节点
    pub fn is_queued(&self, pid: Pid) -> bool {
        self.buckets
            .iter()
            .any(|b| b.lock().iter().any(|w| w.pid == pid))
    }
}

impl Default for FutexTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_granularity() {
        assert_eq!(futex_hash(0x1000), futex_hash(0x1004));
        assert_ne!(futex_hash(0x1000), futex_hash(0x1008));
        assert_eq!(futex_hash(0x1000), futex_hash(0x1000 + 8 * FUTEX_HASH_SIZE));
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内核对象
//!
//! [`Kernel`] 把各子系统粘在一起：
//! - 内核锁 `state` 保护进程表与每 CPU 调度状态，
//!   所有 `status`、IPC 字段与信号状态的修改都在它之下完成
//! - futex 桶有各自的锁，锁顺序固定为 桶锁 → 内核锁
//! - 时钟由外部提供
//!
//! 上下文切换、trap 入口和页表由外部的体系结构代码完成：
//! 它把陷入时的寄存器存进进程记录，调用这里的入口，
//! 再按返回的决策恢复某个进程的 [`TrapFrame`]。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use log::{debug, warn};
use spin::{Mutex, MutexGuard};

use crate::arch::TrapFrame;
use crate::config::{ENABLE_IPC_TIMEOUT, ENABLE_SIGNAL, IPC_SWEEP_INTERVAL_MS, MAX_CPUS};
use crate::errno::KResult;
use crate::ipc;
use crate::mm::AddressSpace;
use crate::process::{Pid, ProcStatus, ProcTable, Process};
use crate::sched::{self, CpuState, SchedDecision};
use crate::signal::{self, Delivery, SigQueued};
use crate::sync::{collect_robust_futexes, mark_owner_died, FutexTable};
use crate::time::{Clock, Millis};

/// 内核锁保护的状态
pub struct KernelState {
    pub procs: ProcTable,
    pub cpus: [CpuState; MAX_CPUS],
}

impl KernelState {
    pub fn new() -> Self {
        Self {
            procs: ProcTable::new(),
            cpus: [CpuState::default(); MAX_CPUS],
        }
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}

/// 返回用户态前的结果
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrapReturn {
    /// 恢复这个上下文
    Resume(TrapFrame),
    /// 进程已被终止，需要重新调度
    Killed,
}

pub struct Kernel {
    state: Mutex<KernelState>,
    futex: FutexTable,
    clock: Arc<dyn Clock>,
    /// 上一次 IPC 超时扫描的时间
    last_sweep: AtomicU64,
}

impl Kernel {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            state: Mutex::new(KernelState::new()),
            futex: FutexTable::new(),
            clock,
            last_sweep: AtomicU64::new(now),
        }
    }

    #[inline]
    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    /// 获取内核锁
    pub fn lock(&self) -> MutexGuard<'_, KernelState> {
        self.state.lock()
    }

    pub fn futex(&self) -> &FutexTable {
        &self.futex
    }

    /// 登记一个由外部加载器创建好的进程，状态为 Runnable
    pub fn spawn(&self, space: Box<dyn AddressSpace>, tf: TrapFrame) -> KResult<Pid> {
        let pid = self.lock().procs.alloc(space, tf)?;
        debug!(target: "proc", "spawned {}", pid);
        Ok(pid)
    }

    /// 进程状态；不存在（或已回收）时为 Free
    pub fn status(&self, pid: Pid) -> ProcStatus {
        self.lock()
            .procs
            .get(pid)
            .map_or(ProcStatus::Free, |p| p.status)
    }

    /// 在内核锁下访问进程记录
    pub fn with_proc<R>(&self, pid: Pid, f: impl FnOnce(&mut Process) -> R) -> Option<R> {
        self.lock().procs.get_mut(pid).map(f)
    }

    /// 为 `cpu` 选择下一个进程
    pub fn schedule(&self, cpu: usize) -> SchedDecision {
        debug_assert!(cpu < MAX_CPUS);
        let now = self.now();
        let mut ks = self.lock();
        let KernelState { procs, cpus } = &mut *ks;
        sched::schedule(procs, &mut cpus[cpu], cpu, now)
    }

    /// 定时器中断：到达扫描间隔时执行一次 IPC 超时扫描
    ///
    /// 返回本次扫描唤醒的进程数。
    pub fn timer_tick(&self) -> usize {
        if !ENABLE_IPC_TIMEOUT {
            return 0;
        }
        let now = self.now();
        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < IPC_SWEEP_INTERVAL_MS {
            return 0;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // 另一个 CPU 已经在扫描
            return 0;
        }
        self.ipc_timeout_tick()
    }

    /// 立即执行一次 IPC 超时扫描
    pub fn ipc_timeout_tick(&self) -> usize {
        let now = self.now();
        ipc::ipc_timeout_tick(&mut self.lock().procs, now)
    }

    /// FUTEX_WAIT
    pub fn futex_wait(&self, pid: Pid, addr: usize, expected: u32) -> KResult<()> {
        self.futex.wait(&self.state, pid, addr, expected)
    }

    /// FUTEX_WAKE
    pub fn futex_wake(&self, addr: usize, max: usize) -> usize {
        self.futex.wake(&self.state, addr, max)
    }

    /// 向 `target` 发送信号
    pub fn sigqueue(&self, target: Pid, signo: u32, value: u64) -> KResult<()> {
        let queued = {
            let mut ks = self.lock();
            let proc = ks.procs.lookup_mut(target)?;
            signal::sigqueue(proc, signo, value)?
        };
        if queued == SigQueued::WaitFault {
            warn!(target: "signal", "{}: sigwait destination faulted, killing", target);
            self.destroy(target)?;
        }
        Ok(())
    }

    /// 销毁进程
    ///
    /// 1. 内核锁下置为 Dying，断开 IPC 与信号状态，收集 robust 锁字
    /// 2. 摘下进程自己的 futex 等待节点
    /// 3. 对每个 robust 锁字唤醒一个等待者
    ///
    /// 之后槽位保持 Dying，直到 [`Kernel::reclaim`]。
    pub fn destroy(&self, pid: Pid) -> KResult<()> {
        let (futex_addr, robust) = {
            let mut ks = self.lock();
            let KernelState { procs, cpus } = &mut *ks;
            let proc = procs.lookup_mut(pid)?;
            proc.status = ProcStatus::Dying;
            proc.recv.recving = false;
            proc.recv.deadline = None;
            proc.send = Default::default();
            proc.signal.wait = None;

            let robust = match proc.robust.take() {
                Some(list) => collect_robust_futexes(&mut *proc.space, list),
                None => Vec::new(),
            };
            for &addr in &robust {
                mark_owner_died(&mut *proc.space, addr, pid);
            }
            let futex_addr = proc.futex_wait;

            if let Some(cpu) = proc.cpu.take() {
                if cpus[cpu].current == Some(pid) {
                    cpus[cpu].current = None;
                }
            }
            (futex_addr, robust)
        };

        if let Some(addr) = futex_addr {
            self.futex.unlink(pid, addr);
            if let Some(proc) = self.lock().procs.get_mut(pid) {
                proc.futex_wait = None;
            }
        }
        for addr in robust {
            self.futex.wake(&self.state, addr, 1);
        }
        debug!(target: "proc", "{} destroyed", pid);
        Ok(())
    }

    /// 回收已销毁的进程，槽位变为 Free
    pub fn reclaim(&self, pid: Pid) -> KResult<()> {
        let proc = self.lock().procs.reclaim(pid)?;
        debug_assert!(!self.futex.is_queued(pid));
        drop(proc);
        Ok(())
    }

    /// 返回用户态前的信号投递
    pub fn trap_return(&self, pid: Pid) -> TrapReturn {
        let delivery = {
            let mut ks = self.lock();
            let Ok(proc) = ks.procs.lookup_mut(pid) else {
                return TrapReturn::Killed;
            };
            if !ENABLE_SIGNAL {
                return TrapReturn::Resume(proc.tf);
            }
            match signal::deliver_pending(proc) {
                Delivery::Terminate(signo) => signo,
                Delivery::None | Delivery::Ignored(_) | Delivery::Delivered(_) => {
                    return TrapReturn::Resume(proc.tf);
                }
            }
        };

        debug!(target: "signal", "{}: fatal signal {}", pid, delivery);
        self.kill(pid, "killed by signal");
        TrapReturn::Killed
    }

    /// 致命错误时终止进程
    pub(crate) fn kill(&self, pid: Pid, why: &str) {
        warn!(target: "proc", "{}: {}, terminating", pid, why);
        if let Err(e) = self.destroy(pid) {
            debug!(target: "proc", "{}: already gone ({:?})", pid, e);
        }
    }

    /// 写入系统调用返回值
    pub(crate) fn set_return(&self, pid: Pid, value: u64) {
        if let Some(proc) = self.lock().procs.get_mut(pid) {
            proc.tf.set_return(value);
        }
    }
}

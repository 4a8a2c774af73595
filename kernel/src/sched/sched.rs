//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 轮转调度器
//!
//! 协作式调度：进程只在阻塞或让出时进入 `schedule()`。
//! 每次调度先执行接收超时扫描，再从上一次运行的槽位之后循环查找
//! 第一个 Runnable（或仍在本 CPU 上 Running）的进程。
//!
//! 找不到可运行进程时：
//! - 其他 CPU 上还有进程在运行、有可运行进程或有阻塞进程在等待截止时间
//!   → [`SchedDecision::Idle`]，打开定时器中断后等待
//! - 否则没有任何进程能再运行 → [`SchedDecision::Monitor`]，进入调试监视器

use log::{info, trace};

use crate::config::NPROC;
use crate::ipc::{deadline_elapsed, expire_recv};
use crate::process::{Pid, ProcStatus, ProcTable};
use crate::time::Millis;

/// 每个 CPU 的调度状态
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CpuState {
    /// 当前运行的进程
    pub current: Option<Pid>,
    /// 上一次被选中的槽位（轮转的起点）
    pub last_slot: Option<usize>,
}

/// 调度决策
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchedDecision {
    /// 切换到该进程
    Run(Pid),
    /// 没有可运行进程，等待中断后重新调度
    Idle,
    /// 没有任何进程能再运行
    Monitor,
}

/// 接收超时扫描（嵌入在每次调度中）
///
/// 把截止时间已到的阻塞接收者以 `ETIMEDOUT` 唤醒，返回唤醒数量。
pub fn timeout_sweep(procs: &mut ProcTable, now: Millis) -> usize {
    let mut woken = 0;
    for proc in procs.iter_mut() {
        if proc.status == ProcStatus::Blocked
            && proc.recv.recving
            && deadline_elapsed(proc.recv.deadline, now)
        {
            expire_recv(proc);
            woken += 1;
        }
    }
    woken
}

/// 为 `cpu` 选择下一个进程
pub fn schedule(
    procs: &mut ProcTable,
    cpu_state: &mut CpuState,
    cpu: usize,
    now: Millis,
) -> SchedDecision {
    timeout_sweep(procs, now);

    let start = cpu_state.last_slot.map_or(0, |s| (s + 1) % NPROC);
    let mut chosen = None;
    for i in 0..NPROC {
        let slot = (start + i) % NPROC;
        let Some(proc) = procs.slot(slot) else {
            continue;
        };
        let runnable = match proc.status {
            ProcStatus::Runnable => true,
            ProcStatus::Running => proc.cpu == Some(cpu),
            _ => false,
        };
        if runnable {
            chosen = Some(slot);
            break;
        }
    }

    // 当前进程若仍在本 CPU 上运行而未被选中，让出 CPU；
    // 它可能已被唤醒并在其他 CPU 上运行，此时不能再动它
    if let Some(prev) = cpu_state.current.take() {
        if let Some(p) = procs.get_mut(prev) {
            if p.cpu == Some(cpu) {
                if p.status == ProcStatus::Running && chosen != Some(prev.slot()) {
                    p.status = ProcStatus::Runnable;
                }
                if p.status != ProcStatus::Running {
                    p.cpu = None;
                }
            }
        }
    }

    if let Some(slot) = chosen {
        if let Some(proc) = procs.slot_mut(slot) {
            proc.status = ProcStatus::Running;
            proc.cpu = Some(cpu);
            proc.runs += 1;
            cpu_state.current = Some(proc.pid);
            cpu_state.last_slot = Some(slot);
            trace!(target: "sched", "cpu{} -> {}", cpu, proc.pid);
            return SchedDecision::Run(proc.pid);
        }
    }

    halt_decision(procs, cpu)
}

/// 没有可运行进程时决定是空闲等待还是进入监视器
fn halt_decision(procs: &ProcTable, cpu: usize) -> SchedDecision {
    let alive_elsewhere = procs.iter().any(|p| {
        p.status == ProcStatus::Runnable || (p.status == ProcStatus::Running && p.cpu != Some(cpu))
    });
    let waiting_deadline = procs.iter().any(|p| p.has_pending_deadline());
    if alive_elsewhere || waiting_deadline {
        trace!(target: "sched", "cpu{} idle", cpu);
        SchedDecision::Idle
    } else {
        info!("cpu{}: no runnable process in the system, entering monitor", cpu);
        SchedDecision::Monitor
    }
}

/// sched_yield：把正在运行的进程放回可运行队列
pub fn sched_yield(procs: &mut ProcTable, pid: Pid) {
    if let Some(proc) = procs.get_mut(pid) {
        if proc.status == ProcStatus::Running {
            proc.status = ProcStatus::Runnable;
        }
    }
}

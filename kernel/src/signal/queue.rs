//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 信号发送、同步等待与动作设置
//!
//! 调用者持有内核锁。涉及写目标进程内存的操作通过
//! [`UserAccess`] 切换到目标地址空间完成。

use log::debug;

use super::{sig_valid, SigAction, SigInfo, SigSet, SigWait, SIGKILL};
use crate::errno::{Errno, KResult};
use crate::mm::{PteFlags, UserAccess};
use crate::process::{ProcStatus, Process};

/// `sigqueue` 的结果
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SigQueued {
    /// 目标在 sigwait 中接受此信号，已直接交付并唤醒
    Bypassed,
    /// 追加到待处理队列
    Queued,
    /// 队列中已有同一信号，合并
    Coalesced,
    /// 写 sigwait 目的地址时出错，目标进程应被终止
    WaitFault,
}

/// 向进程发送信号（对应 Linux 的 rt_sigqueueinfo）
pub fn sigqueue(proc: &mut Process, signo: u32, value: u64) -> KResult<SigQueued> {
    if !sig_valid(signo) {
        return Err(Errno::InvalidArgument);
    }

    if let Some(wait) = proc.signal.wait {
        // SIGKILL 永远不会交给 sigwait
        if signo != SIGKILL && wait.accept.contains(signo) {
            proc.signal.wait = None;
            proc.signal.mask = wait.saved_mask;
            let written = UserAccess::enter(&mut *proc.space).write_u32(wait.dest, signo);
            if written.is_err() {
                return Ok(SigQueued::WaitFault);
            }
            proc.wake_with(0);
            debug!(target: "signal", "signal {} handed to sigwait of {}", signo, proc.pid);
            return Ok(SigQueued::Bypassed);
        }
    }

    let queue = &mut proc.signal.queue;
    if queue.contains(signo) {
        return Ok(SigQueued::Coalesced);
    }
    queue.push(SigInfo { signo, value })?;

    // SIGKILL 打断 sigwait，让下一次返回用户态时处理它
    if signo == SIGKILL {
        if let Some(wait) = proc.signal.wait.take() {
            proc.signal.mask = wait.saved_mask;
            proc.wake_with(Errno::InterruptedSystemCall.as_neg_u64());
        }
    }
    Ok(SigQueued::Queued)
}

/// 同步等待 `accept` 中的任一信号，编号写入 `dest`
///
/// 已有匹配的待处理信号时立即消费并返回 `Some(signo)`；
/// 否则进入等待（临时解除对 `accept` 的屏蔽）并返回 `None`，
/// 调用者应随后调度。SIGKILL 不能被等待，从 `accept` 中去掉。
pub fn sigwait(proc: &mut Process, accept: SigSet, dest: usize) -> KResult<Option<u32>> {
    let accept = accept.without(SIGKILL);
    if accept.is_empty() {
        return Err(Errno::InvalidArgument);
    }
    UserAccess::enter(&mut *proc.space).check(dest, 4, PteFlags::W)?;

    if let Some(index) = proc.signal.queue.first_in(accept) {
        let info = proc.signal.queue.remove_at(index);
        UserAccess::enter(&mut *proc.space).write_u32(dest, info.signo)?;
        return Ok(Some(info.signo));
    }
    if proc.signal.queue.contains(SIGKILL) {
        return Err(Errno::InterruptedSystemCall);
    }

    let saved_mask = proc.signal.mask;
    proc.signal.wait = Some(SigWait {
        accept,
        saved_mask,
        dest,
    });
    proc.signal.mask = saved_mask.difference(accept);
    proc.status = ProcStatus::Blocked;
    debug!(target: "signal", "{} waits for {:#x}", proc.pid, accept.bits());
    Ok(None)
}

/// 设置信号动作，返回旧动作
pub fn sigaction(proc: &mut Process, signo: u32, new: Option<SigAction>) -> KResult<SigAction> {
    if !sig_valid(signo) || signo == SIGKILL {
        return Err(Errno::InvalidArgument);
    }
    let slot = proc.signal.action_mut(signo);
    let old = *slot;
    if let Some(action) = new {
        *slot = action;
    }
    Ok(old)
}

/// 注册异步投递入口；0 表示注销
pub fn register_entry(proc: &mut Process, entry: usize) -> KResult<()> {
    if entry == 0 {
        proc.signal.entry = None;
        return Ok(());
    }
    UserAccess::enter(&mut *proc.space).check(entry, 4, PteFlags::X)?;
    proc.signal.entry = Some(entry);
    Ok(())
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 周期性的 IPC 超时扫描
//!
//! 由定时器按固定间隔驱动，独立于 `schedule()`：
//! - 接收超时：以 `ETIMEDOUT` 唤醒
//! - 带超时的发送：重新尝试投递，根据 [`Attempt`] 决定唤醒结果

use log::trace;

use super::{attempt_delivery, deadline_elapsed, expire_recv, finish_send, Attempt};
use crate::config::NPROC;
use crate::errno::Errno;
use crate::process::{ProcStatus, ProcTable};
use crate::time::Millis;

/// 扫描整个进程表，返回被唤醒的进程数（不含被投递唤醒的接收者）
pub fn ipc_timeout_tick(procs: &mut ProcTable, now: Millis) -> usize {
    let mut woken = 0;
    for slot in 0..NPROC {
        let Some(proc) = procs.slot_mut(slot) else {
            continue;
        };
        if proc.status != ProcStatus::Blocked {
            continue;
        }

        if proc.recv.recving {
            if deadline_elapsed(proc.recv.deadline, now) {
                expire_recv(proc);
                woken += 1;
            }
            continue;
        }
        if !proc.send.sending {
            continue;
        }

        let pid = proc.pid;
        let msg = proc.send.msg;
        let deadline = proc.send.deadline;
        let target = proc.send.target;
        let attempt = match target {
            Some(target) => attempt_delivery(procs, pid, target, &msg),
            None => Attempt::TargetGone,
        };

        let Some(proc) = procs.slot_mut(slot) else {
            continue;
        };
        match attempt {
            Attempt::Delivered => finish_send(proc, 0),
            Attempt::TargetGone => finish_send(proc, Errno::NoSuchProcess.as_neg_u64()),
            Attempt::NotReady if deadline_elapsed(deadline, now) => {
                finish_send(proc, Errno::TimedOut.as_neg_u64())
            }
            Attempt::NotReady => continue,
        }
        trace!(target: "ipc", "sweep: {} send resolved as {:?}", pid, attempt);
        woken += 1;
    }
    woken
}

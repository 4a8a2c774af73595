//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 带超时的进程间消息传递
//!
//! 一条消息是一个 64 位值加可选的负载字节（从发送者地址空间复制到
//! 接收者的缓冲区）。投递只发生在接收者阻塞于 `ipc_recv*` 时。
//!
//! 直接发送的系统调用和周期扫描（[`sweep`]）都通过同一个
//! [`attempt_delivery`] 投递，结果是三态的 [`Attempt`]。
//! 所有函数都要求调用者持有内核锁。

pub mod sweep;

use alloc::vec;
use log::debug;

use crate::errno::{Errno, KResult};
use crate::mm::{PteFlags, UserAccess, USER_ADDR_LIMIT};
use crate::process::{Message, Pid, ProcStatus, ProcTable, Process, RecvState, SendState};
use crate::time::{deadline_after, Millis};

pub use sweep::ipc_timeout_tick;

/// 一次投递尝试的结果
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// 已交给接收者并唤醒它
    Delivered,
    /// 目标存在但没有在接收
    NotReady,
    /// 目标不存在或正在销毁
    TargetGone,
}

/// 可能阻塞的 IPC 调用的结果
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IpcOutcome {
    /// 立即完成，附带系统调用返回值
    Done(u64),
    /// 调用者已置为 Blocked，应当调度
    Blocked,
}

/// 截止时间是否已到
#[inline]
pub fn deadline_elapsed(deadline: Option<Millis>, now: Millis) -> bool {
    deadline.is_some_and(|d| now >= d)
}

/// 检查发送者的负载参数
fn validate_send(proc: &mut Process, msg: &Message) -> KResult<()> {
    if msg.size == 0 {
        return Ok(());
    }
    if msg.src_va >= USER_ADDR_LIMIT {
        return Err(Errno::InvalidArgument);
    }
    let perm = PteFlags::from_bits(msg.perm as u64).ok_or(Errno::InvalidArgument)?;
    let ua = UserAccess::enter(&mut *proc.space);
    ua.check(msg.src_va, msg.size, PteFlags::R)?;
    // 不能授予源内存本身没有的写权限
    if perm.contains(PteFlags::W) {
        ua.check(msg.src_va, msg.size, PteFlags::W)
            .map_err(|_| Errno::InvalidArgument)?;
    }
    Ok(())
}

/// 把负载从发送者复制到接收者
fn copy_payload(
    sender: &mut Process,
    receiver: &mut Process,
    src: usize,
    len: usize,
) -> KResult<()> {
    let mut buf = vec![0u8; len];
    UserAccess::enter(&mut *sender.space).read(src, &mut buf)?;
    let dst = receiver.recv.dst_va;
    UserAccess::enter(&mut *receiver.space).write(dst, &buf)
}

/// 完成接收：记录结果并唤醒接收者，值作为其系统调用返回值
fn complete_recv(sender: &mut Process, receiver: &mut Process, msg: &Message) {
    let mut size = 0;
    let mut perm = 0;
    if msg.size > 0 && receiver.recv.max_size > 0 {
        let len = msg.size.min(receiver.recv.max_size);
        match copy_payload(sender, receiver, msg.src_va, len) {
            Ok(()) => {
                size = len;
                perm = msg.perm;
            }
            Err(e) => debug!(
                target: "ipc",
                "payload {} -> {} dropped: {:?}",
                sender.pid,
                receiver.pid,
                e
            ),
        }
    }

    let recv = &mut receiver.recv;
    recv.recving = false;
    recv.deadline = None;
    recv.timed_out = false;
    recv.from = Some(sender.pid);
    recv.value = msg.value;
    recv.perm = perm;
    recv.size = size;
    receiver.wake_with(msg.value);
    debug!(target: "ipc", "{} -> {}: value {:#x}", sender.pid, receiver.pid, msg.value);
}

/// 尝试把 `msg` 从 `sender` 投递给 `target`
///
/// 幂等：`NotReady` 与 `TargetGone` 不修改任何状态。
pub fn attempt_delivery(procs: &mut ProcTable, sender: Pid, target: Pid, msg: &Message) -> Attempt {
    if procs.lookup(target).is_err() {
        return Attempt::TargetGone;
    }
    if sender.slot() == target.slot() {
        return Attempt::NotReady;
    }
    let Some((s, r)) = procs.pair_mut(sender, target) else {
        return Attempt::TargetGone;
    };
    if !(r.recv.recving && r.status == ProcStatus::Blocked) {
        return Attempt::NotReady;
    }
    complete_recv(s, r, msg);
    Attempt::Delivered
}

/// 接收超时：清除接收状态并以 `ETIMEDOUT` 唤醒
pub fn expire_recv(proc: &mut Process) {
    let recv = &mut proc.recv;
    recv.recving = false;
    recv.deadline = None;
    recv.timed_out = true;
    recv.clear_result();
    proc.wake_with(Errno::TimedOut.as_neg_u64());
    debug!(target: "ipc", "{}: receive timed out", proc.pid);
}

/// 结束带超时的发送并唤醒发送者
pub fn finish_send(proc: &mut Process, ret: u64) {
    proc.send = SendState::default();
    proc.wake_with(ret);
}

/// 不阻塞的发送（ipc_try_send）
///
/// 目标未在接收时返回 `IpcNotRecv`，调用者自行重试。
pub fn try_send(procs: &mut ProcTable, pid: Pid, target: Pid, msg: Message) -> KResult<()> {
    validate_send(procs.lookup_mut(pid)?, &msg)?;
    match attempt_delivery(procs, pid, target, &msg) {
        Attempt::Delivered => Ok(()),
        Attempt::NotReady => Err(Errno::IpcNotRecv),
        Attempt::TargetGone => Err(Errno::NoSuchProcess),
    }
}

/// 带超时的发送：先尝试一次，目标未就绪时阻塞到截止时间
pub fn send_timeout(
    procs: &mut ProcTable,
    pid: Pid,
    target: Pid,
    msg: Message,
    timeout_ms: Millis,
    now: Millis,
) -> KResult<IpcOutcome> {
    if timeout_ms == 0 {
        return Err(Errno::BadTimeout);
    }
    validate_send(procs.lookup_mut(pid)?, &msg)?;
    match attempt_delivery(procs, pid, target, &msg) {
        Attempt::Delivered => Ok(IpcOutcome::Done(0)),
        Attempt::TargetGone => Err(Errno::NoSuchProcess),
        Attempt::NotReady => {
            let proc = procs.lookup_mut(pid)?;
            proc.send = SendState {
                sending: true,
                target: Some(target),
                msg,
                deadline: Some(deadline_after(now, timeout_ms)),
            };
            proc.status = ProcStatus::Blocked;
            debug!(target: "ipc", "{} blocks sending to {} for {}ms", pid, target, timeout_ms);
            Ok(IpcOutcome::Blocked)
        }
    }
}

/// 接收消息；`timeout_ms` 为 `None` 时无限等待
///
/// 已有发送者阻塞在向本进程的带超时发送上时（槽位最低者优先）立即完成。
pub fn recv(
    procs: &mut ProcTable,
    pid: Pid,
    dst_va: usize,
    max_size: usize,
    timeout_ms: Option<Millis>,
    now: Millis,
) -> KResult<IpcOutcome> {
    if timeout_ms == Some(0) {
        return Err(Errno::BadTimeout);
    }

    let proc = procs.lookup_mut(pid)?;
    if max_size > 0 {
        if dst_va >= USER_ADDR_LIMIT {
            return Err(Errno::InvalidArgument);
        }
        UserAccess::enter(&mut *proc.space).check(dst_va, max_size, PteFlags::W)?;
    }
    let prev = proc.status;
    proc.recv = RecvState {
        recving: true,
        deadline: timeout_ms.map(|t| deadline_after(now, t)),
        dst_va,
        max_size,
        ..RecvState::default()
    };
    proc.status = ProcStatus::Blocked;

    let pending = procs
        .iter()
        .find(|s| s.status == ProcStatus::Blocked && s.send.sending && s.send.target == Some(pid))
        .map(|s| (s.pid, s.send.msg));
    if let Some((sender, msg)) = pending {
        if attempt_delivery(procs, sender, pid, &msg) == Attempt::Delivered {
            if let Some(s) = procs.get_mut(sender) {
                finish_send(s, 0);
            }
            let proc = procs.lookup_mut(pid)?;
            proc.status = prev;
            return Ok(IpcOutcome::Done(msg.value));
        }
    }
    debug!(target: "ipc", "{} blocks receiving", pid);
    Ok(IpcOutcome::Blocked)
}

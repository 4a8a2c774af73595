//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 信号投递与 rt_sigreturn
//!
//! 对应 Linux 的 do_signal() / setup_rt_frame() / sys_rt_sigreturn()。
//! 这里只修改进程记录，是否终止进程由调用者根据 [`Delivery`] 决定。

use log::{trace, warn};

use super::{SaFlags, SigAction, SigHandler, SigSet, Sigframe, SIGKILL};
use crate::config::SIGFRAME_ALIGN;
use crate::errno::{Errno, KResult};
use crate::mm::{PteFlags, UserAccess};
use crate::process::Process;

/// 入口函数调用时栈指针在帧下方预留的字节
const FRAME_GAP: usize = 16;

/// 一次返回用户态时的投递结果
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// 没有可投递的信号
    None,
    /// 信号被忽略并丢弃
    Ignored(u32),
    /// 已构造信号帧，上下文指向入口函数
    Delivered(u32),
    /// 进程必须被终止
    Terminate(u32),
}

/// 返回用户态前投递至多一个信号
pub fn deliver_pending(proc: &mut Process) -> Delivery {
    if !proc.tf.from_user() || proc.signal.is_waiting() {
        return Delivery::None;
    }

    let Some(entry) = proc.signal.entry else {
        // 没有入口时只有 SIGKILL 可以处理，其余信号保持待处理
        return match proc.signal.queue.take(SIGKILL) {
            Some(_) => Delivery::Terminate(SIGKILL),
            None => Delivery::None,
        };
    };

    let Some(index) = proc.signal.queue.first_unmasked(proc.signal.mask) else {
        return Delivery::None;
    };
    let info = proc.signal.queue.remove_at(index);
    if info.signo == SIGKILL {
        return Delivery::Terminate(SIGKILL);
    }

    let action = *proc.signal.action(info.signo);
    match action.handler {
        SigHandler::Ignore => Delivery::Ignored(info.signo),
        SigHandler::Default => Delivery::Terminate(info.signo),
        SigHandler::Handler(handler) | SigHandler::HandlerWithInfo(handler) => {
            match setup_frame(proc, entry, handler, info.signo, info.value, &action) {
                Ok(()) => Delivery::Delivered(info.signo),
                Err(_) => {
                    warn!(
                        target: "signal",
                        "{}: cannot write frame for signal {} (sp={:#x})",
                        proc.pid, info.signo, proc.tf.sp
                    );
                    Delivery::Terminate(info.signo)
                }
            }
        }
    }
}

/// 在用户栈上构造信号帧并改写上下文
fn setup_frame(
    proc: &mut Process,
    entry: usize,
    handler: usize,
    signo: u32,
    value: u64,
    action: &SigAction,
) -> KResult<()> {
    let sp = proc.tf.sp as usize;
    let frame = sp
        .checked_sub(Sigframe::SIZE)
        .map(|a| a & !(SIGFRAME_ALIGN - 1))
        .ok_or(Errno::BadAddress)?;
    let user_sp = frame.checked_sub(FRAME_GAP).ok_or(Errno::BadAddress)?;

    let old_mask = proc.signal.mask;
    let sigframe = Sigframe {
        tf: proc.tf,
        oldmask: old_mask.bits(),
        signo: signo as u64,
        value,
        handler: handler as u64,
        flags: action.flags.bits() as u64,
    };
    UserAccess::enter(&mut *proc.space).write(frame, sigframe.as_bytes())?;

    let mut mask = old_mask.union(action.mask);
    if !action.flags.contains(SaFlags::SA_NODEFER) {
        mask = mask.with(signo);
    }
    proc.signal.mask = mask.without(SIGKILL);
    if action.flags.contains(SaFlags::SA_RESETHAND) {
        *proc.signal.action_mut(signo) = SigAction::DEFAULT;
    }

    proc.tf.pc = entry as u64;
    proc.tf.sp = user_sp as u64;
    proc.tf.a0 = frame as u64;
    trace!(target: "signal", "{}: signal {} frame at {:#x}", proc.pid, signo, frame);
    Ok(())
}

/// 从信号帧恢复上下文与屏蔽字
///
/// 帧不可读或未对齐时返回 `EFAULT`，调用者应终止进程。
pub fn return_from_signal(proc: &mut Process, frame: usize) -> KResult<()> {
    if frame % SIGFRAME_ALIGN != 0 {
        return Err(Errno::BadAddress);
    }
    let mut bytes = [0u8; Sigframe::SIZE];
    UserAccess::enter(&mut *proc.space).read(frame, &mut bytes)?;
    let sigframe = Sigframe::from_bytes(&bytes);

    proc.tf = sigframe.tf;
    proc.tf.force_user();
    proc.signal.mask = SigSet::from_bits(sigframe.oldmask).without(SIGKILL);
    trace!(target: "signal", "{}: sigreturn to {:#x}", proc.pid, proc.tf.pc);
    Ok(())
}

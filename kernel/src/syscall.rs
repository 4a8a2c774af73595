//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 系统调用分发
//!
//! 外部的 trap 入口把寄存器保存进进程记录（并让 pc 越过 ecall）后调用
//! [`Kernel::syscall`]。约定：
//! - a7: 系统调用号
//! - a0-a5: 参数
//! - 返回值写回 a0，错误为负的 errno
//!
//! 阻塞的调用返回 [`SysOutcome::Block`]，返回值稍后由唤醒者写入 a0。
//! 进程 ID 参数为 0 表示调用者自己。

use log::trace;

use crate::config::ENABLE_FUTEX;
use crate::errno::{Errno, KResult};
use crate::ipc::{self, IpcOutcome};
use crate::kernel::Kernel;
use crate::mm::{PteFlags, UserAccess};
use crate::process::{Message, Pid};
use crate::sched;
use crate::signal::{self, SigAction, SigSet, UserSigAction};
use crate::sync::{self, FUTEX_WAIT, FUTEX_WAKE};

/// 系统调用号
#[repr(usize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyscallNo {
    /// 同步
    Futex = 98,
    SetRobustList = 99,

    /// 调度
    SchedYield = 124,

    /// 信号
    RtSigaction = 134,
    RtSigtimedwait = 137,
    RtSigqueueinfo = 138,
    RtSigreturn = 139,

    /// IPC
    IpcTrySend = 1100,
    IpcRecv = 1101,
    IpcSendTimeout = 1102,
    IpcRecvTimeout = 1103,

    /// 注册信号入口
    SigEntry = 1104,
}

impl SyscallNo {
    pub fn from_usize(no: usize) -> Option<Self> {
        Some(match no {
            98 => Self::Futex,
            99 => Self::SetRobustList,
            124 => Self::SchedYield,
            134 => Self::RtSigaction,
            137 => Self::RtSigtimedwait,
            138 => Self::RtSigqueueinfo,
            139 => Self::RtSigreturn,
            1100 => Self::IpcTrySend,
            1101 => Self::IpcRecv,
            1102 => Self::IpcSendTimeout,
            1103 => Self::IpcRecvTimeout,
            1104 => Self::SigEntry,
            _ => return None,
        })
    }
}

/// 系统调用的结果
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SysOutcome {
    /// 已完成，值已写入 a0
    Return(u64),
    /// 调用者已阻塞，需要调度
    Block,
    /// 调用者让出 CPU（仍可运行），需要调度
    Yield,
    /// rt_sigreturn 替换了上下文
    Restored,
    /// 调用者已被终止
    Exited,
}

impl Kernel {
    /// 处理 `pid` 保存的上下文中的系统调用
    pub fn syscall(&self, pid: Pid) -> SysOutcome {
        let Some((no, args)) = self.with_proc(pid, |p| (p.tf.syscall_no(), p.tf.syscall_args()))
        else {
            return SysOutcome::Exited;
        };
        trace!(target: "syscall", "{}: syscall {} {:x?}", pid, no, args);

        let result = match SyscallNo::from_usize(no) {
            Some(SyscallNo::Futex) => self.sys_futex(pid, args),
            Some(SyscallNo::SetRobustList) => self.sys_set_robust_list(pid, args),
            Some(SyscallNo::SchedYield) => self.sys_sched_yield(pid),
            Some(SyscallNo::RtSigaction) => self.sys_sigaction(pid, args),
            Some(SyscallNo::RtSigtimedwait) => self.sys_sigwait(pid, args),
            Some(SyscallNo::RtSigqueueinfo) => self.sys_sigqueue(pid, args),
            Some(SyscallNo::RtSigreturn) => self.sys_sigreturn(pid, args),
            Some(SyscallNo::IpcTrySend) => self.sys_ipc_try_send(pid, args),
            Some(SyscallNo::IpcRecv) => self.sys_ipc_recv(pid, args, None),
            Some(SyscallNo::IpcSendTimeout) => self.sys_ipc_send_timeout(pid, args),
            Some(SyscallNo::IpcRecvTimeout) => self.sys_ipc_recv(pid, args, Some(args[2] as u64)),
            Some(SyscallNo::SigEntry) => self.sys_sigentry(pid, args),
            None => Err(Errno::FunctionNotImplemented),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => SysOutcome::Return(e.as_neg_u64()),
        };
        if let SysOutcome::Return(value) = outcome {
            self.set_return(pid, value);
        }
        outcome
    }

    /// 系统调用参数中的进程 ID，0 表示调用者
    fn resolve_pid(caller: Pid, raw: usize) -> KResult<Pid> {
        match raw {
            0 => Ok(caller),
            raw => u32::try_from(raw)
                .map(Pid::from_raw)
                .map_err(|_| Errno::NoSuchProcess),
        }
    }

    fn sys_futex(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        if !ENABLE_FUTEX {
            return Err(Errno::FunctionNotImplemented);
        }
        let (addr, op, val) = (args[0], args[1], args[2]);
        match op {
            FUTEX_WAIT => {
                self.futex_wait(pid, addr, val as u32)?;
                Ok(SysOutcome::Block)
            }
            FUTEX_WAKE => Ok(SysOutcome::Return(self.futex_wake(addr, val) as u64)),
            _ => Err(Errno::FunctionNotImplemented),
        }
    }

    fn sys_set_robust_list(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let mut ks = self.lock();
        let proc = ks.procs.lookup_mut(pid)?;
        sync::set_robust_list(proc, args[0], args[1])?;
        Ok(SysOutcome::Return(0))
    }

    fn sys_sched_yield(&self, pid: Pid) -> KResult<SysOutcome> {
        let mut ks = self.lock();
        ks.procs.lookup_mut(pid)?.tf.set_return(0);
        sched::sched_yield(&mut ks.procs, pid);
        Ok(SysOutcome::Yield)
    }

    fn sys_sigaction(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let (signo, new_va, old_va) = (args[0] as u32, args[1], args[2]);
        if !signal::sig_valid(signo) || signo == signal::SIGKILL {
            return Err(Errno::InvalidArgument);
        }
        let mut ks = self.lock();
        let proc = ks.procs.lookup_mut(pid)?;

        let new = if new_va != 0 {
            let mut raw = [0u8; UserSigAction::SIZE];
            UserAccess::enter(&mut *proc.space).read(new_va, &mut raw)?;
            Some(SigAction::from_user(&UserSigAction::from_bytes(&raw))?)
        } else {
            None
        };
        if old_va != 0 {
            UserAccess::enter(&mut *proc.space).check(old_va, UserSigAction::SIZE, PteFlags::W)?;
        }

        let old = signal::sigaction(proc, signo, new)?;
        if old_va != 0 {
            UserAccess::enter(&mut *proc.space).write(old_va, &old.to_user().to_bytes())?;
        }
        Ok(SysOutcome::Return(0))
    }

    fn sys_sigwait(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let accept = SigSet::from_bits(args[0] as u64);
        let mut ks = self.lock();
        let proc = ks.procs.lookup_mut(pid)?;
        match signal::sigwait(proc, accept, args[1])? {
            Some(_) => Ok(SysOutcome::Return(0)),
            None => Ok(SysOutcome::Block),
        }
    }

    fn sys_sigqueue(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let target = Self::resolve_pid(pid, args[0])?;
        self.sigqueue(target, args[1] as u32, args[2] as u64)?;
        Ok(SysOutcome::Return(0))
    }

    fn sys_sigreturn(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let restored = {
            let mut ks = self.lock();
            let proc = ks.procs.lookup_mut(pid)?;
            signal::return_from_signal(proc, args[0])
        };
        match restored {
            Ok(()) => Ok(SysOutcome::Restored),
            Err(_) => {
                self.kill(pid, "bad signal frame");
                Ok(SysOutcome::Exited)
            }
        }
    }

    fn sys_sigentry(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let mut ks = self.lock();
        let proc = ks.procs.lookup_mut(pid)?;
        signal::register_entry(proc, args[0])?;
        Ok(SysOutcome::Return(0))
    }

    fn sys_ipc_try_send(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let target = Self::resolve_pid(pid, args[0])?;
        let msg = message(args);
        ipc::try_send(&mut self.lock().procs, pid, target, msg)?;
        Ok(SysOutcome::Return(0))
    }

    fn sys_ipc_send_timeout(&self, pid: Pid, args: [usize; 6]) -> KResult<SysOutcome> {
        let target = Self::resolve_pid(pid, args[0])?;
        let msg = message(args);
        let now = self.now();
        let outcome = ipc::send_timeout(
            &mut self.lock().procs,
            pid,
            target,
            msg,
            args[5] as u64,
            now,
        )?;
        Ok(ipc_outcome(outcome))
    }

    fn sys_ipc_recv(
        &self,
        pid: Pid,
        args: [usize; 6],
        timeout: Option<u64>,
    ) -> KResult<SysOutcome> {
        let now = self.now();
        let outcome = ipc::recv(&mut self.lock().procs, pid, args[0], args[1], timeout, now)?;
        Ok(ipc_outcome(outcome))
    }
}

/// a1..a4 = value, src_va, size, perm
fn message(args: [usize; 6]) -> Message {
    Message {
        value: args[1] as u64,
        src_va: args[2],
        size: args[3],
        perm: args[4] as u32,
    }
}

fn ipc_outcome(outcome: IpcOutcome) -> SysOutcome {
    match outcome {
        IpcOutcome::Done(value) => SysOutcome::Return(value),
        IpcOutcome::Blocked => SysOutcome::Block,
    }
}

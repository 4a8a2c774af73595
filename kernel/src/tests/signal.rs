//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

// 测试：信号排队、sigwait、投递与 rt_sigreturn

use super::common::{neg, Harness, DATA, ENTRY, STACK_TOP};
use crate::config::SIG_QUEUE_MAX;
use crate::errno::Errno;
use crate::kernel::TrapReturn;
use crate::mm::AddressSpace;
use crate::process::{Pid, ProcStatus};
use crate::signal::{sig_bit, SaFlags, SigSet, UserSigAction, SIGKILL, SIGTERM, SIGUSR1, SIGUSR2};
use crate::syscall::{SysOutcome, SyscallNo};

fn queue_len(h: &Harness, pid: Pid) -> usize {
    h.kernel.with_proc(pid, |p| p.signal.queue.len()).unwrap()
}

fn mask(h: &Harness, pid: Pid) -> u64 {
    h.kernel.with_proc(pid, |p| p.signal.mask.bits()).unwrap()
}

/// 通过系统调用注册入口和 `signo` 的处理函数
fn install_handler(h: &Harness, pid: Pid, signo: u32, act_mask: u64, flags: SaFlags) {
    h.set_running(pid);
    assert_eq!(h.syscall(pid, SyscallNo::SigEntry, &[ENTRY]), SysOutcome::Return(0));
    let act = UserSigAction {
        handler: ENTRY as u64 + 0x200,
        mask: act_mask,
        flags: flags.bits(),
        _pad: 0,
    };
    h.poke_bytes(pid, DATA + 0x800, &act.to_bytes());
    assert_eq!(
        h.syscall(pid, SyscallNo::RtSigaction, &[signo as usize, DATA + 0x800, 0]),
        SysOutcome::Return(0)
    );
}

#[test]
fn test_queue_coalesce_and_bound() {
    let h = Harness::new();
    let b = h.spawn();

    // 测试 1: 同一信号重复发送不增加队列长度
    h.kernel.sigqueue(b, SIGUSR1, 1).unwrap();
    h.kernel.sigqueue(b, SIGUSR1, 2).unwrap();
    assert_eq!(queue_len(&h, b), 1);

    // 测试 2: 第 33 个不同信号返回资源不足
    for signo in 1..=SIG_QUEUE_MAX as u32 {
        h.kernel.sigqueue(b, signo, 0).unwrap();
    }
    assert_eq!(queue_len(&h, b), SIG_QUEUE_MAX);
    assert_eq!(
        h.kernel.sigqueue(b, SIG_QUEUE_MAX as u32 + 1, 0),
        Err(Errno::OutOfMemory)
    );
    assert_eq!(queue_len(&h, b), SIG_QUEUE_MAX);
}

#[test]
fn test_sigqueue_errors() {
    let h = Harness::new();
    let a = h.spawn();
    h.set_running(a);
    h.syscall(a, SyscallNo::RtSigqueueinfo, &[0, 0, 0]);
    assert_eq!(h.ret(a), neg(Errno::InvalidArgument));
    h.syscall(a, SyscallNo::RtSigqueueinfo, &[0, 65, 0]);
    assert_eq!(h.ret(a), neg(Errno::InvalidArgument));
    let ghost = Pid::new(9, 40).as_u32() as usize;
    h.syscall(a, SyscallNo::RtSigqueueinfo, &[ghost, SIGUSR1 as usize, 0]);
    assert_eq!(h.ret(a), neg(Errno::NoSuchProcess));
    // pid 0 表示自己
    assert_eq!(
        h.syscall(a, SyscallNo::RtSigqueueinfo, &[0, SIGUSR2 as usize, 0]),
        SysOutcome::Return(0)
    );
    assert_eq!(queue_len(&h, a), 1);
}

#[test]
fn test_sigwait_bypasses_queue() {
    let h = Harness::new();
    let (a, b) = (h.spawn(), h.spawn());
    let dest = DATA + 0x40;
    h.kernel.with_proc(b, |p| p.signal.mask = SigSet::from_bits(sig_bit(SIGUSR1)));
    let before = mask(&h, b);

    h.set_running(b);
    assert_eq!(
        h.syscall(b, SyscallNo::RtSigtimedwait, &[sig_bit(SIGUSR1) as usize, dest]),
        SysOutcome::Block
    );
    assert_eq!(h.status(b), ProcStatus::Blocked);
    assert_eq!(mask(&h, b) & sig_bit(SIGUSR1), 0, "accepted signal unmasked while waiting");

    h.set_running(a);
    assert_eq!(
        h.syscall(a, SyscallNo::RtSigqueueinfo, &[b.as_u32() as usize, SIGUSR1 as usize, 5]),
        SysOutcome::Return(0)
    );
    assert_eq!(h.status(b), ProcStatus::Runnable);
    assert_eq!(h.ret(b), 0);
    assert_eq!(h.peek_u32(b, dest), SIGUSR1);
    assert_eq!(queue_len(&h, b), 0, "signal must not appear in the async queue");
    assert_eq!(mask(&h, b), before);

    // 不接受的信号照常排队，不唤醒
    h.set_running(b);
    h.syscall(b, SyscallNo::RtSigtimedwait, &[sig_bit(SIGUSR1) as usize, dest]);
    h.kernel.sigqueue(b, SIGUSR2, 0).unwrap();
    assert_eq!(h.status(b), ProcStatus::Blocked);
    assert_eq!(queue_len(&h, b), 1);
}

#[test]
fn test_sigwait_picks_pending() {
    let h = Harness::new();
    let b = h.spawn();
    h.kernel.sigqueue(b, SIGTERM, 0).unwrap();
    h.set_running(b);
    assert_eq!(
        h.syscall(b, SyscallNo::RtSigtimedwait, &[sig_bit(SIGTERM) as usize, DATA]),
        SysOutcome::Return(0)
    );
    assert_eq!(h.peek_u32(b, DATA), SIGTERM);
    assert_eq!(h.status(b), ProcStatus::Running);
}

#[test]
fn test_sigkill_without_entry_terminates() {
    let h = Harness::new();
    let (a, b) = (h.spawn(), h.spawn());
    h.kernel.sigqueue(b, SIGUSR1, 0).unwrap();
    // 没有入口：普通信号保持待处理
    assert!(matches!(h.kernel.trap_return(b), TrapReturn::Resume(_)));
    assert_eq!(queue_len(&h, b), 1);

    h.set_running(a);
    h.syscall(a, SyscallNo::RtSigqueueinfo, &[b.as_u32() as usize, SIGKILL as usize, 0]);
    assert_eq!(h.kernel.trap_return(b), TrapReturn::Killed);
    assert_eq!(h.status(b), ProcStatus::Dying);
    h.kernel.reclaim(b).unwrap();
}

#[test]
fn test_sigkill_not_taken_by_sigwait() {
    let h = Harness::new();
    let b = h.spawn();
    h.set_running(b);

    // 测试 1: 只等待 SIGKILL 是非法参数
    h.syscall(b, SyscallNo::RtSigtimedwait, &[sig_bit(SIGKILL) as usize, DATA]);
    assert_eq!(h.ret(b), neg(Errno::InvalidArgument));

    // 测试 2: SIGKILL 打断 sigwait，下一次返回用户态时终止进程
    let accept = sig_bit(SIGKILL) | sig_bit(SIGUSR1);
    assert_eq!(
        h.syscall(b, SyscallNo::RtSigtimedwait, &[accept as usize, DATA]),
        SysOutcome::Block
    );
    h.kernel.sigqueue(b, SIGKILL, 0).unwrap();
    assert_eq!(h.status(b), ProcStatus::Runnable);
    assert_eq!(h.ret(b), neg(Errno::InterruptedSystemCall));
    assert_ne!(h.peek_u32(b, DATA), SIGKILL, "SIGKILL must not be handed to sigwait");
    assert_eq!(h.kernel.trap_return(b), TrapReturn::Killed);
    assert_eq!(h.status(b), ProcStatus::Dying);
}

#[test]
fn test_sigaction_sigkill_rejected() {
    let h = Harness::new();
    let a = h.spawn();
    h.set_running(a);
    h.syscall(a, SyscallNo::RtSigaction, &[SIGKILL as usize, DATA, 0]);
    assert_eq!(h.ret(a), neg(Errno::InvalidArgument));
}

#[test]
fn test_handler_delivery_and_return() {
    let h = Harness::new();
    let b = h.spawn();
    install_handler(&h, b, SIGUSR1, sig_bit(SIGTERM), SaFlags::SA_SIGINFO);
    let pre_mask = sig_bit(SIGUSR2);
    h.kernel.with_proc(b, |p| p.signal.mask = SigSet::from_bits(pre_mask));
    let pre_tf = h.kernel.with_proc(b, |p| p.tf).unwrap();

    h.kernel.sigqueue(b, SIGUSR1, 99).unwrap();
    let TrapReturn::Resume(tf) = h.kernel.trap_return(b) else {
        panic!("handler delivery must not kill");
    };
    assert_eq!(tf.pc, ENTRY as u64);
    let frame = tf.a0 as usize;
    assert_eq!(frame % 16, 0);
    assert!(frame < STACK_TOP);
    assert_eq!(mask(&h, b), pre_mask | sig_bit(SIGTERM) | sig_bit(SIGUSR1));

    // 入口函数调用处理函数后执行 rt_sigreturn(frame)
    assert_eq!(h.syscall(b, SyscallNo::RtSigreturn, &[frame]), SysOutcome::Restored);
    let tf = h.kernel.with_proc(b, |p| p.tf).unwrap();
    assert_eq!(tf, pre_tf);
    assert_eq!(mask(&h, b), pre_mask, "mask restored exactly");
}

#[test]
fn test_one_signal_per_return() {
    let h = Harness::new();
    let b = h.spawn();
    install_handler(&h, b, SIGUSR1, 0, SaFlags::empty());
    install_handler(&h, b, SIGUSR2, 0, SaFlags::empty());
    h.kernel.sigqueue(b, SIGUSR2, 0).unwrap();
    h.kernel.sigqueue(b, SIGUSR1, 0).unwrap();

    assert!(matches!(h.kernel.trap_return(b), TrapReturn::Resume(_)));
    assert_eq!(queue_len(&h, b), 1);
    let first = h.kernel.with_proc(b, |p| p.tf.a0).unwrap();
    // 按到达顺序：先投递 SIGUSR2
    assert_eq!(h.peek_u32(b, first as usize + 0x110), SIGUSR2);
}

#[test]
fn test_frame_fault_terminates() {
    let h = Harness::new();
    let b = h.spawn();
    install_handler(&h, b, SIGUSR1, 0, SaFlags::empty());
    h.kernel.with_proc(b, |p| p.tf.sp = 0x200000);
    h.kernel.sigqueue(b, SIGUSR1, 0).unwrap();
    assert_eq!(h.kernel.trap_return(b), TrapReturn::Killed);
    assert_eq!(h.status(b), ProcStatus::Dying);
}

#[test]
fn test_bad_sigreturn_frame_terminates() {
    let h = Harness::new();
    let b = h.spawn();
    h.set_running(b);
    assert_eq!(h.syscall(b, SyscallNo::RtSigreturn, &[0x300000]), SysOutcome::Exited);
    assert_eq!(h.status(b), ProcStatus::Dying);
}

#[test]
fn test_default_action_terminates() {
    let h = Harness::new();
    let b = h.spawn();
    h.set_running(b);
    h.syscall(b, SyscallNo::SigEntry, &[ENTRY]);
    h.kernel.sigqueue(b, SIGTERM, 0).unwrap();
    assert_eq!(h.kernel.trap_return(b), TrapReturn::Killed);
}

#[test]
fn test_old_action_written_back() {
    let h = Harness::new();
    let b = h.spawn();
    install_handler(&h, b, SIGUSR1, sig_bit(SIGTERM), SaFlags::empty());
    assert_eq!(
        h.syscall(b, SyscallNo::RtSigaction, &[SIGUSR1 as usize, 0, DATA + 0x900]),
        SysOutcome::Return(0)
    );
    let mut raw = [0u8; UserSigAction::SIZE];
    h.kernel
        .with_proc(b, |p| p.space.read_bytes(DATA + 0x900, &mut raw))
        .unwrap()
        .unwrap();
    let old = UserSigAction::from_bytes(&raw);
    assert_eq!(old.handler, ENTRY as u64 + 0x200);
    assert_eq!(old.mask, sig_bit(SIGTERM));
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

// 测试夹具：内核 + 手动时钟 + 模拟用户地址空间

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::arch::TrapFrame;
use crate::kernel::Kernel;
use crate::mm::sim::SimSpace;
use crate::mm::{AddressSpace, PteFlags, PAGE_SIZE};
use crate::process::{Pid, ProcStatus};
use crate::syscall::{SysOutcome, SyscallNo};
use crate::time::TickClock;

/// 代码页（可执行，信号入口放在这里）
pub const ENTRY: usize = 0x1000;
/// 可读写的数据区（4 页）
pub const DATA: usize = 0x10000;
pub const DATA_PAGES: usize = 4;
/// 用户栈顶（下面 2 页可读写）
pub const STACK_TOP: usize = 0x80000;

pub struct Harness {
    pub kernel: Kernel,
    pub clock: Arc<TickClock>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(TickClock::new(0));
        let kernel = Kernel::new(clock.clone());
        Self { kernel, clock }
    }

    /// 带代码页、数据区和栈的地址空间
    pub fn user_space() -> SimSpace {
        let mut space = SimSpace::new();
        space.map(ENTRY, PAGE_SIZE, PteFlags::USER_R | PteFlags::X);
        space.map(DATA, PAGE_SIZE * DATA_PAGES, PteFlags::USER_RW);
        space.map(STACK_TOP - 2 * PAGE_SIZE, 2 * PAGE_SIZE, PteFlags::USER_RW);
        space
    }

    pub fn spawn(&self) -> Pid {
        self.spawn_with(Self::user_space())
    }

    pub fn spawn_with(&self, space: SimSpace) -> Pid {
        self.kernel
            .spawn(
                Box::new(space),
                TrapFrame::new_user(ENTRY as u64 + 0x100, STACK_TOP as u64 - 16),
            )
            .unwrap()
    }

    /// 若干共享数据区首页的进程
    pub fn spawn_sharing(&self, n: usize) -> alloc::vec::Vec<Pid> {
        let first = Self::user_space();
        let mut spaces = alloc::vec::Vec::new();
        for _ in 1..n {
            let mut space = Self::user_space();
            first.share_into(DATA, &mut space, PteFlags::USER_RW).unwrap();
            spaces.push(space);
        }
        let mut pids = alloc::vec![self.spawn_with(first)];
        pids.extend(spaces.into_iter().map(|s| self.spawn_with(s)));
        pids
    }

    /// 模拟进程正在 CPU 0 上运行（发起系统调用前的状态）
    pub fn set_running(&self, pid: Pid) {
        self.kernel
            .with_proc(pid, |p| {
                p.status = ProcStatus::Running;
                p.cpu = Some(0);
            })
            .unwrap();
    }

    /// 以 `pid` 的身份发起系统调用
    pub fn syscall(&self, pid: Pid, no: SyscallNo, args: &[usize]) -> SysOutcome {
        self.kernel
            .with_proc(pid, |p| {
                p.tf.a7 = no as u64;
                let regs = [
                    &mut p.tf.a0,
                    &mut p.tf.a1,
                    &mut p.tf.a2,
                    &mut p.tf.a3,
                    &mut p.tf.a4,
                    &mut p.tf.a5,
                ];
                let args = args.iter().copied().chain(core::iter::repeat(0));
                for (reg, arg) in regs.into_iter().zip(args) {
                    *reg = arg as u64;
                }
            })
            .unwrap();
        self.kernel.syscall(pid)
    }

    /// 保存的 a0（有符号）
    pub fn ret(&self, pid: Pid) -> i64 {
        self.kernel.with_proc(pid, |p| p.tf.a0 as i64).unwrap()
    }

    pub fn status(&self, pid: Pid) -> ProcStatus {
        self.kernel.status(pid)
    }

    pub fn poke_u32(&self, pid: Pid, va: usize, value: u32) {
        self.kernel
            .with_proc(pid, |p| p.space.write_bytes(va, &value.to_ne_bytes()))
            .unwrap()
            .unwrap();
    }

    pub fn peek_u32(&self, pid: Pid, va: usize) -> u32 {
        self.kernel
            .with_proc(pid, |p| {
                let mut buf = [0u8; 4];
                p.space.read_bytes(va, &mut buf).map(|_| u32::from_ne_bytes(buf))
            })
            .unwrap()
            .unwrap()
    }

    pub fn poke_bytes(&self, pid: Pid, va: usize, data: &[u8]) {
        self.kernel
            .with_proc(pid, |p| p.space.write_bytes(va, data))
            .unwrap()
            .unwrap();
    }

    /// 推进时钟
    pub fn advance(&self, ms: u64) {
        self.clock.advance(ms);
    }
}

/// 负的 errno
pub fn neg(e: crate::errno::Errno) -> i64 {
    e.as_neg_i32() as i64
}

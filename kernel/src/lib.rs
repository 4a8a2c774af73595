//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! Rux 调度与同步核心
//!
//! 协作式轮转调度器，以及共享同一进程状态机的三种阻塞原语：
//! - 带超时的进程间消息传递 (`ipc`)
//! - 按地址等待/唤醒的 futex (`sync`)
//! - POSIX 风格的信号排队与投递 (`signal`)
//!
//! 内核构建为 `no_std` + `alloc`；测试在宿主机上运行，
//! 用户地址空间与时钟由 `mm::sim::SimSpace` 和 [`time::TickClock`] 模拟。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod errno;
pub mod ipc;
pub mod kernel;
pub mod klog;
pub mod mm;
pub mod process;
pub mod sched;
pub mod signal;
pub mod sync;
pub mod syscall;
pub mod time;

#[cfg(test)]
mod tests;

pub use errno::{Errno, KResult};
pub use kernel::{Kernel, KernelState, TrapReturn};
pub use process::{Pid, ProcStatus};
pub use sched::SchedDecision;
pub use syscall::{SysOutcome, SyscallNo};

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器模块
//!
//! 当前实现：单一轮转调度（协作式），没有调度类与多核负载均衡。
//! 调度入口 `Kernel::schedule()` 在内核锁下调用 [`sched::schedule`]，
//! 实际的上下文切换由外部 trap 汇编根据 [`SchedDecision`] 完成。

pub mod sched;

pub use sched::{sched_yield, schedule, timeout_sweep, CpuState, SchedDecision};

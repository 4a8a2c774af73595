//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 架构相关代码
//!
//! 当前支持的架构：
//! - **RISC-V (riscv64)** - 陷入帧布局与系统调用约定
//!
//! 上下文切换、trap 向量和 `sret` 由外部的 trap 汇编完成，
//! 本核心只读写保存在进程记录中的 [`TrapFrame`]。

pub mod riscv64;

pub use riscv64::trap::{TrapFrame, SSTATUS_SPIE, SSTATUS_SPP};

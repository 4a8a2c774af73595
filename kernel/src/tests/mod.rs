//! 场景测试
//!
//! 在宿主机上用模拟地址空间和手动推进的时钟驱动整个核心：
//! 进程由 [`common::Harness`] 创建，系统调用通过保存的上下文发起，
//! 和真实 trap 入口的调用方式一致。
//!
//! 运行测试：
//! ```bash
//! cargo test --package rux-sync
//! ```

mod common;

mod signal;

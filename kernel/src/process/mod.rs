//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程管理模块
//!
//! 进程表、进程 ID 与进程记录。进程与地址空间的创建、ELF 加载
//! 由外部加载器完成，这里只提供 [`ProcTable::alloc`] 这一薄接口。

pub mod pid;
pub mod table;
pub mod task;

pub use pid::Pid;
pub use table::ProcTable;
pub use task::{Message, ProcStatus, Process, RecvState, SendState};

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内存管理接口
//!
//! 页表管理与缺页处理属于外部协作者；本核心只通过 [`AddressSpace`]
//! 检查权限并读写用户内存。

#[cfg(test)]
pub mod sim;
pub mod uaccess;

pub use crate::config::{PAGE_SIZE, USER_ADDR_LIMIT};
pub use uaccess::{user_mem_check, AddressSpace, PteFlags, UserAccess};

/// 向下对齐到页边界
#[inline]
pub const fn page_round_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

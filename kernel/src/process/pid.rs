//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程 ID
//!
//! 进程 ID 由两部分组成：
//! - 低 `LOG2NPROC` 位：进程表槽位号
//! - 高位：槽位的代数，每次复用槽位时加一
//!
//! 槽位被回收再分配后，旧的进程 ID 因为代数不同不会再解析到新进程。
//! 进程 ID 永不为 0（系统调用中 0 表示调用者自己）。

use core::fmt;

use crate::config::{LOG2NPROC, NPROC};

/// 代数的最大值（超过后回绕到 1）
const GENERATION_MAX: u32 = u32::MAX >> LOG2NPROC;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u32);

impl Pid {
    #[inline]
    pub const fn new(generation: u32, slot: usize) -> Self {
        Self((generation << LOG2NPROC) | (slot as u32 & (NPROC as u32 - 1)))
    }

    /// 从系统调用参数还原；不检查是否存活
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// 槽位号
    #[inline]
    pub const fn slot(self) -> usize {
        (self.0 & (NPROC as u32 - 1)) as usize
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.0 >> LOG2NPROC
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// 槽位复用时的下一代数，跳过 0
#[inline]
pub(crate) fn next_generation(generation: u32) -> u32 {
    if generation >= GENERATION_MAX {
        1
    } else {
        generation + 1
    }
}

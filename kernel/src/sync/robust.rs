//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! Robust futex 链表
//!
//! 对应 Linux 的 set_robust_list / exit_robust_list (kernel/futex/core.c)。
//! 用户态把自己持有的锁串成 `{next, futex_addr}` 链表并登记表头，
//! 进程死亡时内核沿链表给每个锁字打上 OWNER_DIED 并唤醒一个等待者。

use alloc::vec::Vec;
use log::debug;

use crate::config::ROBUST_LIST_LIMIT;
use crate::errno::{Errno, KResult};
use crate::mm::{AddressSpace, PteFlags, UserAccess};
use crate::process::{Pid, Process};

/// 锁字中有等待者
pub const FUTEX_WAITERS: u32 = 0x8000_0000;
/// 持有者已死亡
pub const FUTEX_OWNER_DIED: u32 = 0x4000_0000;
/// 持有者 ID 所在的位
pub const FUTEX_TID_MASK: u32 = 0x3fff_ffff;

/// 一条链表记录 `{next: u64, futex_addr: u64}` 的字节数
pub const ROBUST_ENTRY_SIZE: usize = 16;

/// 已登记的 robust 链表
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RobustList {
    pub head: usize,
    /// 最多遍历的记录数
    pub len: usize,
}

/// 登记 robust 链表；`(0, 0)` 注销
pub fn set_robust_list(proc: &mut Process, head: usize, len: usize) -> KResult<()> {
    if head == 0 && len == 0 {
        proc.robust = None;
        return Ok(());
    }
    if head == 0 || len == 0 || len > ROBUST_LIST_LIMIT || head % 8 != 0 {
        return Err(Errno::InvalidArgument);
    }
    UserAccess::enter(&mut *proc.space).check(head, ROBUST_ENTRY_SIZE, PteFlags::R)?;
    proc.robust = Some(RobustList { head, len });
    Ok(())
}

/// 沿链表收集锁字地址
///
/// 以登记的长度与 `ROBUST_LIST_LIMIT` 为上限；
/// 遇到空 next、回到表头或不可读的记录时停止。
pub fn collect_robust_futexes(space: &mut dyn AddressSpace, list: RobustList) -> Vec<usize> {
    let ua = UserAccess::enter(space);
    let mut addrs = Vec::new();
    let mut cur = list.head;
    for _ in 0..list.len.min(ROBUST_LIST_LIMIT) {
        let mut entry = [0u8; ROBUST_ENTRY_SIZE];
        if ua.read(cur, &mut entry).is_err() {
            break;
        }
        let (next, futex) = entry.split_at(8);
        let next = u64::from_ne_bytes(next.try_into().unwrap_or([0; 8])) as usize;
        let futex = u64::from_ne_bytes(futex.try_into().unwrap_or([0; 8])) as usize;
        if futex != 0 && futex % 4 == 0 {
            addrs.push(futex);
        }
        if next == 0 || next == list.head {
            break;
        }
        cur = next;
    }
    addrs
}

/// 锁字的持有者是 `pid` 时设置 OWNER_DIED（保留 WAITERS，清除持有者）
pub fn mark_owner_died(space: &mut dyn AddressSpace, addr: usize, pid: Pid) -> bool {
    let mut ua = UserAccess::enter(space);
    let Ok(word) = ua.read_u32(addr) else {
        return false;
    };
    if word & FUTEX_TID_MASK != pid.as_u32() & FUTEX_TID_MASK {
        return false;
    }
    let new = (word & FUTEX_WAITERS) | FUTEX_OWNER_DIED;
    if ua.write_u32(addr, new).is_err() {
        return false;
    }
    debug!(target: "futex", "{}: owner died on {:#x}", pid, addr);
    true
}

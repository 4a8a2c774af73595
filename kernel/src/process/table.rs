//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程表
//!
//! 固定 `NPROC` 个槽位。子系统之间只保存 [`Pid`]，
//! 销毁进程时只需让槽位失效，不需要追踪指针。

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::pid::next_generation;
use super::{Pid, ProcStatus, Process};
use crate::arch::TrapFrame;
use crate::config::NPROC;
use crate::errno::{Errno, KResult};
use crate::mm::AddressSpace;

struct Slot {
    generation: u32,
    proc: Option<Box<Process>>,
}

pub struct ProcTable {
    slots: Vec<Slot>,
}

impl ProcTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(NPROC);
        slots.resize_with(NPROC, || Slot {
            generation: 1,
            proc: None,
        });
        Self { slots }
    }

    /// 在最低的空闲槽位上创建进程，状态为 Runnable
    pub fn alloc(&mut self, space: Box<dyn AddressSpace>, tf: TrapFrame) -> KResult<Pid> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.proc.is_none())
            .ok_or(Errno::OutOfMemory)?;
        let pid = Pid::new(slot.generation, index);
        slot.proc = Some(Box::new(Process::new(pid, space, tf)));
        Ok(pid)
    }

    /// 任意状态（包括 Dying）的进程
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        let slot = self.slots.get(pid.slot())?;
        match slot.proc.as_deref() {
            Some(p) if p.pid == pid => Some(p),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        let slot = self.slots.get_mut(pid.slot())?;
        match slot.proc.as_deref_mut() {
            Some(p) if p.pid == pid => Some(p),
            _ => None,
        }
    }

    /// 查找存活进程；空闲、已过期或正在销毁的 ID 返回 `ESRCH`
    pub fn lookup(&self, pid: Pid) -> KResult<&Process> {
        match self.get(pid) {
            Some(p) if p.status != ProcStatus::Dying => Ok(p),
            _ => Err(Errno::NoSuchProcess),
        }
    }

    pub fn lookup_mut(&mut self, pid: Pid) -> KResult<&mut Process> {
        match self.get_mut(pid) {
            Some(p) if p.status != ProcStatus::Dying => Ok(p),
            _ => Err(Errno::NoSuchProcess),
        }
    }

    /// 按槽位访问
    pub fn slot(&self, index: usize) -> Option<&Process> {
        self.slots.get(index)?.proc.as_deref()
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Process> {
        self.slots.get_mut(index)?.proc.as_deref_mut()
    }

    /// 同时可变借用两个不同槽位上的进程
    pub fn pair_mut(&mut self, a: Pid, b: Pid) -> Option<(&mut Process, &mut Process)> {
        let (ia, ib) = (a.slot(), b.slot());
        if ia == ib {
            return None;
        }
        let (lo, hi) = (ia.min(ib), ia.max(ib));
        let (left, right) = self.slots.split_at_mut(hi);
        let p_lo = left[lo].proc.as_deref_mut()?;
        let p_hi = right[0].proc.as_deref_mut()?;
        let (pa, pb) = if ia < ib { (p_lo, p_hi) } else { (p_hi, p_lo) };
        if pa.pid != a || pb.pid != b {
            return None;
        }
        Some((pa, pb))
    }

    /// 回收处于 Dying 的进程，槽位代数加一
    pub fn reclaim(&mut self, pid: Pid) -> KResult<Box<Process>> {
        match self.get(pid) {
            Some(p) if p.status == ProcStatus::Dying => {}
            Some(_) => return Err(Errno::InvalidArgument),
            None => return Err(Errno::NoSuchProcess),
        }
        let slot = &mut self.slots[pid.slot()];
        let proc = slot.proc.take().ok_or(Errno::NoSuchProcess)?;
        debug_assert!(proc.futex_wait.is_none(), "reclaiming {} with a queued futex waiter", pid);
        slot.generation = next_generation(slot.generation);
        Ok(proc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter().filter_map(|s| s.proc.as_deref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.slots.iter_mut().filter_map(|s| s.proc.as_deref_mut())
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}

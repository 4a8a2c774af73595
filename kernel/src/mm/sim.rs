//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 模拟用户地址空间
//!
//! 以页为粒度的稀疏地址空间，用于在宿主机上驱动调度/IPC/信号逻辑。
//! 物理页以 `Arc` 共享，可以把同一页映射进多个进程（共享 futex 字）。

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

use super::uaccess::{AddressSpace, PteFlags};
use super::{page_round_down, PAGE_SIZE};
use crate::errno::{Errno, KResult};

type Frame = Arc<Mutex<[u8; PAGE_SIZE]>>;

struct SimPage {
    flags: PteFlags,
    frame: Frame,
}

/// 稀疏的模拟地址空间
pub struct SimSpace {
    pages: BTreeMap<usize, SimPage>,
    /// 当前嵌套的 activate 深度
    active: AtomicUsize,
}

impl SimSpace {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            active: AtomicUsize::new(0),
        }
    }

    /// 映射覆盖 `[va, va + len)` 的所有页（新页清零）
    pub fn map(&mut self, va: usize, len: usize, flags: PteFlags) {
        let mut page = page_round_down(va);
        let end = va + len.max(1);
        while page < end {
            self.pages.insert(
                page,
                SimPage {
                    flags: flags | PteFlags::V,
                    frame: Arc::new(Mutex::new([0u8; PAGE_SIZE])),
                },
            );
            page += PAGE_SIZE;
        }
    }

    /// 把本空间 `va` 所在页共享映射到 `other` 的同一地址
    pub fn share_into(&self, va: usize, other: &mut SimSpace, flags: PteFlags) -> KResult<()> {
        let page = page_round_down(va);
        let frame = self
            .pages
            .get(&page)
            .map(|p| p.frame.clone())
            .ok_or(Errno::BadAddress)?;
        other.pages.insert(
            page,
            SimPage {
                flags: flags | PteFlags::V,
                frame,
            },
        );
        Ok(())
    }

    /// 是否处于 activate 状态
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) != 0
    }

    /// 绕过权限检查直接读 u32（测试与调试用）
    pub fn peek_u32(&self, va: usize) -> Option<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(va, &mut buf).ok()?;
        Some(u32::from_ne_bytes(buf))
    }

    /// 绕过权限检查直接写 u32
    pub fn poke_u32(&mut self, va: usize, value: u32) -> KResult<()> {
        self.write_bytes(va, &value.to_ne_bytes())
    }

    fn for_each_chunk(
        &self,
        va: usize,
        len: usize,
        mut f: impl FnMut(&Frame, usize, usize, usize),
    ) -> KResult<()> {
        let mut done = 0;
        while done < len {
            let addr = va + done;
            let page = page_round_down(addr);
            let offset = addr - page;
            let chunk = (PAGE_SIZE - offset).min(len - done);
            let sim = self.pages.get(&page).ok_or(Errno::BadAddress)?;
            f(&sim.frame, offset, done, chunk);
            done += chunk;
        }
        Ok(())
    }
}

impl Default for SimSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace for SimSpace {
    fn translate(&self, va: usize) -> Option<PteFlags> {
        self.pages.get(&page_round_down(va)).map(|p| p.flags)
    }

    fn read_bytes(&self, va: usize, buf: &mut [u8]) -> KResult<()> {
        va.checked_add(buf.len()).ok_or(Errno::BadAddress)?;
        self.for_each_chunk(va, buf.len(), |frame, offset, done, chunk| {
            let data = frame.lock();
            buf[done..done + chunk].copy_from_slice(&data[offset..offset + chunk]);
        })
    }

    fn write_bytes(&mut self, va: usize, data: &[u8]) -> KResult<()> {
        va.checked_add(data.len()).ok_or(Errno::BadAddress)?;
        // 先确认全部页存在，避免部分写入
        self.for_each_chunk(va, data.len(), |_, _, _, _| {})?;
        self.for_each_chunk(va, data.len(), |frame, offset, done, chunk| {
            let mut page = frame.lock();
            page[offset..offset + chunk].copy_from_slice(&data[done..done + chunk]);
        })
    }

    fn activate(&self) {
        self.active.fetch_add(1, Ordering::AcqRel);
    }

    fn deactivate(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_cross_page_copy() {
        let mut space = SimSpace::new();
        space.map(0x4000, PAGE_SIZE * 2, PteFlags::USER_RW);
        let data = [0xabu8; 32];
        space.write_bytes(0x4ff0, &data).unwrap();
        let mut back = [0u8; 32];
        space.read_bytes(0x4ff0, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_sim_unmapped_write_is_atomic() {
        let mut space = SimSpace::new();
        space.map(0x4000, PAGE_SIZE, PteFlags::USER_RW);
        assert_eq!(space.write_bytes(0x4ffc, &[1u8; 8]), Err(Errno::BadAddress));
        assert_eq!(space.peek_u32(0x4ffc), Some(0));
    }

    #[test]
    fn test_sim_shared_page() {
        let mut a = SimSpace::new();
        let mut b = SimSpace::new();
        a.map(0x8000, PAGE_SIZE, PteFlags::USER_RW);
        a.share_into(0x8000, &mut b, PteFlags::USER_RW).unwrap();
        a.poke_u32(0x8010, 5).unwrap();
        assert_eq!(b.peek_u32(0x8010), Some(5));
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 用户内存访问
//!
//! 跨地址空间的写入（例如 sigwait 投递、信号帧、IPC 负载）一律通过
//! [`UserAccess`] 完成：进入时切换到目标地址空间，检查权限后按字节复制，
//! 离开作用域时（包括提前返回错误时）切换回来。

use bitflags::bitflags;

use super::{page_round_down, PAGE_SIZE, USER_ADDR_LIMIT};
use crate::errno::{Errno, KResult};

bitflags! {
    /// 页表项权限位（Sv39 PTE 低位布局）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u64 {
        const V = 1 << 0;
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
    }
}

impl PteFlags {
    /// 用户可读
    pub const USER_R: PteFlags = PteFlags::V.union(PteFlags::U).union(PteFlags::R);
    /// 用户可读写
    pub const USER_RW: PteFlags = PteFlags::USER_R.union(PteFlags::W);
}

/// 进程地址空间
///
/// 由外部的页表实现提供。`read_bytes`/`write_bytes` 只做复制，
/// 权限检查由 [`UserAccess`] 负责。
pub trait AddressSpace: Send {
    /// 查询 `va` 所在页的权限，未映射返回 `None`
    fn translate(&self, va: usize) -> Option<PteFlags>;

    /// 从 `va` 复制 `buf.len()` 字节
    fn read_bytes(&self, va: usize, buf: &mut [u8]) -> KResult<()>;

    /// 向 `va` 写入 `data`
    fn write_bytes(&mut self, va: usize, data: &[u8]) -> KResult<()>;

    /// 切换到本地址空间（写 satp）
    fn activate(&self) {}

    /// 切换回之前的地址空间
    fn deactivate(&self) {}
}

/// 检查 `[va, va + len)` 全部落在用户区且每页都具备 `perm | U | V`
///
/// 对应 JOS/Linux 的 user_mem_check / access_ok
pub fn user_mem_check(
    space: &dyn AddressSpace,
    va: usize,
    len: usize,
    perm: PteFlags,
) -> KResult<()> {
    let end = va.checked_add(len).ok_or(Errno::BadAddress)?;
    if end > USER_ADDR_LIMIT {
        return Err(Errno::BadAddress);
    }
    if len == 0 {
        return Ok(());
    }

    let need = perm | PteFlags::U | PteFlags::V;
    let mut page = page_round_down(va);
    while page < end {
        match space.translate(page) {
            Some(flags) if flags.contains(need) => {}
            _ => return Err(Errno::BadAddress),
        }
        page += PAGE_SIZE;
    }
    Ok(())
}

/// 作用域内的地址空间切换
pub struct UserAccess<'a> {
    space: &'a mut dyn AddressSpace,
}

impl<'a> UserAccess<'a> {
    /// 切换到 `space`；返回的守卫被丢弃时切换回来
    pub fn enter(space: &'a mut dyn AddressSpace) -> Self {
        space.activate();
        Self { space }
    }

    pub fn check(&self, va: usize, len: usize, perm: PteFlags) -> KResult<()> {
        user_mem_check(&*self.space, va, len, perm)
    }

    /// 检查可读后复制
    pub fn read(&self, va: usize, buf: &mut [u8]) -> KResult<()> {
        self.check(va, buf.len(), PteFlags::R)?;
        self.space.read_bytes(va, buf)
    }

    /// 检查可写后复制
    pub fn write(&mut self, va: usize, data: &[u8]) -> KResult<()> {
        self.check(va, data.len(), PteFlags::W)?;
        self.space.write_bytes(va, data)
    }

    pub fn read_u32(&self, va: usize) -> KResult<u32> {
        let mut buf = [0u8; 4];
        self.read(va, &mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    pub fn write_u32(&mut self, va: usize, value: u32) -> KResult<()> {
        self.write(va, &value.to_ne_bytes())
    }

    pub fn read_u64(&self, va: usize) -> KResult<u64> {
        let mut buf = [0u8; 8];
        self.read(va, &mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    pub fn write_u64(&mut self, va: usize, value: u64) -> KResult<()> {
        self.write(va, &value.to_ne_bytes())
    }
}

impl Drop for UserAccess<'_> {
    fn drop(&mut self) {
        self.space.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::sim::SimSpace;

    #[test]
    fn test_user_mem_check_bounds() {
        let mut space = SimSpace::new();
        space.map(0x10000, PAGE_SIZE * 2, PteFlags::USER_RW);

        assert!(user_mem_check(&space, 0x10000, 8, PteFlags::W).is_ok());
        // 跨两页
        assert!(user_mem_check(&space, 0x10ffc, 8, PteFlags::W).is_ok());
        // 第三页未映射
        assert_eq!(
            user_mem_check(&space, 0x11ffc, 8, PteFlags::R),
            Err(Errno::BadAddress)
        );
        assert_eq!(
            user_mem_check(&space, USER_ADDR_LIMIT - 4, 8, PteFlags::R),
            Err(Errno::BadAddress)
        );
        assert_eq!(
            user_mem_check(&space, usize::MAX - 2, 8, PteFlags::R),
            Err(Errno::BadAddress)
        );
    }

    #[test]
    fn test_user_access_rejects_readonly_write() {
        let mut space = SimSpace::new();
        space.map(0x20000, PAGE_SIZE, PteFlags::USER_R);
        {
            let mut ua = UserAccess::enter(&mut space);
            assert_eq!(ua.write_u32(0x20000, 7), Err(Errno::BadAddress));
            assert_eq!(ua.read_u32(0x20000), Ok(0));
        }
        // 提前返回错误后仍然切换回来
        assert!(!space.is_active());
    }

    #[test]
    fn test_user_access_roundtrip_u64() {
        let mut space = SimSpace::new();
        space.map(0x30000, PAGE_SIZE, PteFlags::USER_RW);
        let mut ua = UserAccess::enter(&mut space);
        ua.write_u64(0x30ff8, 0xdead_beef_cafe).unwrap();
        assert_eq!(ua.read_u64(0x30ff8), Ok(0xdead_beef_cafe));
    }
}

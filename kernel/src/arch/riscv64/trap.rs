//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! RISC-V 陷入帧
//!
//! RISC-V 系统调用约定:
//! - a7: 系统调用号
//! - a0-a5: 参数 (最多6个)
//! - 返回值: a0
//! - 错误码: a0 设置为负数

/// sstatus.SPP：陷入前的特权级（1 = S 模式）
pub const SSTATUS_SPP: u64 = 1 << 8;

/// sstatus.SPIE：sret 后重新打开中断
pub const SSTATUS_SPIE: u64 = 1 << 5;

/// 用户态陷入时保存的完整寄存器上下文
///
/// 全部字段为 u64 且无隐式填充，信号帧按字节原样写入用户栈。
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub a0: u64,   // offset 0   - 返回值 / 第1个参数
    pub a1: u64,   // offset 8   - 第2个参数
    pub a2: u64,   // offset 16  - 第3个参数
    pub a3: u64,   // offset 24  - 第4个参数
    pub a4: u64,   // offset 32  - 第5个参数
    pub a5: u64,   // offset 40  - 第6个参数
    pub a6: u64,   // offset 48
    pub a7: u64,   // offset 56  - 系统调用号
    pub t0: u64,   // offset 64
    pub t1: u64,   // offset 72
    pub t2: u64,   // offset 80
    pub t3: u64,   // offset 88
    pub t4: u64,   // offset 96
    pub t5: u64,   // offset 104
    pub t6: u64,   // offset 112
    pub s0: u64,   // offset 120
    pub s1: u64,   // offset 128
    pub s2: u64,   // offset 136
    pub s3: u64,   // offset 144
    pub s4: u64,   // offset 152
    pub s5: u64,   // offset 160
    pub s6: u64,   // offset 168
    pub s7: u64,   // offset 176
    pub s8: u64,   // offset 184
    pub s9: u64,   // offset 192
    pub s10: u64,  // offset 200
    pub s11: u64,  // offset 208
    pub ra: u64,   // offset 216 - 返回地址
    pub sp: u64,   // offset 224 - 栈指针
    pub gp: u64,   // offset 232
    pub tp: u64,   // offset 240
    pub pc: u64,   // offset 248 - sepc
    pub status: u64, // offset 256 - sstatus
}

impl TrapFrame {
    /// 用户程序的初始上下文：从 `entry` 开始执行，栈顶 `sp`
    pub fn new_user(entry: u64, sp: u64) -> Self {
        Self {
            pc: entry,
            sp,
            status: SSTATUS_SPIE,
            ..Self::default()
        }
    }

    /// 陷入是否来自用户态
    #[inline]
    pub fn from_user(&self) -> bool {
        self.status & SSTATUS_SPP == 0
    }

    /// 强制 sret 回到用户态（用于 sigreturn 恢复用户提供的帧）
    #[inline]
    pub fn force_user(&mut self) {
        self.status &= !SSTATUS_SPP;
        self.status |= SSTATUS_SPIE;
    }

    /// 系统调用号 (a7)
    #[inline]
    pub fn syscall_no(&self) -> usize {
        self.a7 as usize
    }

    /// 系统调用参数 a0-a5
    #[inline]
    pub fn syscall_args(&self) -> [usize; 6] {
        [
            self.a0 as usize,
            self.a1 as usize,
            self.a2 as usize,
            self.a3 as usize,
            self.a4 as usize,
            self.a5 as usize,
        ]
    }

    /// 写入系统调用返回值
    #[inline]
    pub fn set_return(&mut self, value: u64) {
        self.a0 = value;
    }

    /// 以字节视图访问（用于写入信号帧）
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: repr(C)、全部为 u64 字段，无填充字节
        unsafe {
            core::slice::from_raw_parts(
                self as *const Self as *const u8,
                core::mem::size_of::<Self>(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trapframe_layout() {
        assert_eq!(core::mem::size_of::<TrapFrame>(), 33 * 8);
        assert_eq!(core::mem::offset_of!(TrapFrame, a7), 56);
        assert_eq!(core::mem::offset_of!(TrapFrame, sp), 224);
        assert_eq!(core::mem::offset_of!(TrapFrame, pc), 248);
    }

    #[test]
    fn test_privilege_bits() {
        let mut tf = TrapFrame::new_user(0x1000, 0x8000);
        assert!(tf.from_user());
        tf.status |= SSTATUS_SPP;
        assert!(!tf.from_user());
        tf.force_user();
        assert!(tf.from_user());
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 标准错误代码定义
//!
//! 和 include/uapi/asm-generic/errno.h 对齐，另加少量内核私有错误码
//! （>= 512，与 Linux 的 ERESTARTSYS 区段一致，不会泄漏为 POSIX 值）

/// 标准错误代码
///
/// 使用方法：
/// ```rust
/// use rux_sync::errno::{Errno, KResult};
///
/// fn check(sig: i32) -> KResult<()> {
///     if sig <= 0 {
///         return Err(Errno::InvalidArgument);
///     }
///     Ok(())
/// }
/// assert_eq!(check(0).unwrap_err().as_neg_i32(), -22);
/// ```
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// No such process (ESRCH, 3)
    NoSuchProcess = 3,

    /// Interrupted system call (EINTR, 4)
    InterruptedSystemCall = 4,

    /// Try again / would block (EAGAIN == EWOULDBLOCK, 11)
    TryAgain = 11,

    /// Out of memory (ENOMEM, 12)
    OutOfMemory = 12,

    /// Bad address (EFAULT, 14)
    BadAddress = 14,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,

    /// Function not implemented (ENOSYS, 38)
    FunctionNotImplemented = 38,

    /// Connection timed out (ETIMEDOUT, 110)
    TimedOut = 110,

    /// IPC 目标当前不在接收状态（调用者重试）
    IpcNotRecv = 530,

    /// 非法的超时参数
    BadTimeout = 531,
}

impl Errno {
    /// EWOULDBLOCK 与 EAGAIN 同值
    pub const WOULD_BLOCK: Errno = Errno::TryAgain;

    /// 获取错误代码的正数值（用于比较）
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// 获取错误代码的负数值（用于系统调用返回）
    #[inline]
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }

    /// 获取错误代码的负数值（u64，写入 a0）
    #[inline]
    pub const fn as_neg_u64(self) -> u64 {
        (-(self as i32)) as i64 as u64
    }

    /// 从系统调用返回值还原错误码
    pub fn from_ret(ret: i64) -> Option<Errno> {
        let code = -ret;
        Some(match code {
            3 => Errno::NoSuchProcess,
            4 => Errno::InterruptedSystemCall,
            11 => Errno::TryAgain,
            12 => Errno::OutOfMemory,
            14 => Errno::BadAddress,
            22 => Errno::InvalidArgument,
            38 => Errno::FunctionNotImplemented,
            110 => Errno::TimedOut,
            530 => Errno::IpcNotRecv,
            531 => Errno::BadTimeout,
            _ => return None,
        })
    }
}

/// 内核内部操作的结果类型
pub type KResult<T> = Result<T, Errno>;

/// 常用的错误代码常量
pub mod constants {
    pub const ESRCH: i32 = 3;
    pub const EINTR: i32 = 4;
    pub const EAGAIN: i32 = 11;
    pub const EWOULDBLOCK: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EINVAL: i32 = 22;
    pub const ENOSYS: i32 = 38;
    pub const ETIMEDOUT: i32 = 110;
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 信号处理机制
//!
//! 参考 Linux 的信号设计 (kernel/signal.c, include/linux/signal.h)，
//! 但不做实时信号的计数排队：
//! - 每个进程一个有界的待处理队列（按到达顺序，每个信号最多一项）
//! - 屏蔽字 `mask`（SIGKILL 永远不可屏蔽）
//! - `sigwait` 同步等待：匹配的信号绕过队列直接写给等待者
//! - 异步投递：返回用户态前在用户栈上构造 [`Sigframe`]，
//!   跳转到进程注册的入口（trampoline），由它调用真正的处理函数后
//!   再通过 `rt_sigreturn` 恢复

pub mod deliver;
pub mod queue;

use bitflags::bitflags;

use crate::arch::TrapFrame;
use crate::config::{NSIG, SIG_QUEUE_MAX, USER_ADDR_LIMIT};
use crate::errno::{Errno, KResult};

pub use deliver::{deliver_pending, return_from_signal, Delivery};
pub use queue::{register_entry, sigaction, sigqueue, sigwait, SigQueued};

/// 标准信号编号 (include/uapi/asm-generic/signal.h)
pub const SIGHUP: u32 = 1;
pub const SIGINT: u32 = 2;
pub const SIGQUIT: u32 = 3;
pub const SIGILL: u32 = 4;
pub const SIGTRAP: u32 = 5;
pub const SIGABRT: u32 = 6;
pub const SIGBUS: u32 = 7;
pub const SIGFPE: u32 = 8;
/// 强制杀死，不可捕获、忽略或屏蔽
pub const SIGKILL: u32 = 9;
pub const SIGUSR1: u32 = 10;
pub const SIGSEGV: u32 = 11;
pub const SIGUSR2: u32 = 12;
pub const SIGPIPE: u32 = 13;
pub const SIGALRM: u32 = 14;
pub const SIGTERM: u32 = 15;
pub const SIGSTKFLT: u32 = 16;
pub const SIGCHLD: u32 = 17;
pub const SIGCONT: u32 = 18;
pub const SIGSTOP: u32 = 19;
pub const SIGTSTP: u32 = 20;
pub const SIGTTIN: u32 = 21;
pub const SIGTTOU: u32 = 22;
pub const SIGURG: u32 = 23;
pub const SIGXCPU: u32 = 24;
pub const SIGXFSZ: u32 = 25;
pub const SIGVTALRM: u32 = 26;
pub const SIGPROF: u32 = 27;
pub const SIGWINCH: u32 = 28;
pub const SIGIO: u32 = 29;
pub const SIGPWR: u32 = 30;
pub const SIGSYS: u32 = 31;

/// 最大的实时信号
pub const SIGRTMAX: u32 = NSIG as u32;

/// 信号编号是否合法（1..=NSIG）
#[inline]
pub const fn sig_valid(signo: u32) -> bool {
    signo >= 1 && signo as usize <= NSIG
}

/// 信号在集合中的位
#[inline]
pub const fn sig_bit(signo: u32) -> u64 {
    1u64 << (signo - 1)
}

/// 64 位信号集合
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SigSet(u64);

impl SigSet {
    pub const EMPTY: SigSet = SigSet(0);

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, signo: u32) -> bool {
        sig_valid(signo) && self.0 & sig_bit(signo) != 0
    }

    #[must_use]
    pub fn with(self, signo: u32) -> Self {
        debug_assert!(sig_valid(signo));
        Self(self.0 | sig_bit(signo))
    }

    #[must_use]
    pub fn without(self, signo: u32) -> Self {
        debug_assert!(sig_valid(signo));
        Self(self.0 & !sig_bit(signo))
    }

    #[must_use]
    pub const fn union(self, other: SigSet) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn difference(self, other: SigSet) -> Self {
        Self(self.0 & !other.0)
    }
}

bitflags! {
    /// sigaction 的 sa_flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SaFlags: u32 {
        /// 处理函数需要 siginfo（信号值）
        const SA_SIGINFO = 0x0000_0001;
        /// 处理期间不自动屏蔽本信号
        const SA_NODEFER = 0x4000_0000;
        /// 投递一次后恢复为默认动作
        const SA_RESETHAND = 0x8000_0000;
    }
}

/// 信号处理方式
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SigHandler {
    /// 默认动作（终止进程）
    Default,
    /// 忽略
    Ignore,
    /// 用户处理函数 `fn(signo)`
    Handler(usize),
    /// 用户处理函数 `fn(signo, value)`（SA_SIGINFO）
    HandlerWithInfo(usize),
}

/// 用户态 sigaction 结构的原始值
pub const SIG_DFL: u64 = 0;
pub const SIG_IGN: u64 = 1;

/// 信号动作
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SigAction {
    pub handler: SigHandler,
    /// 处理期间额外屏蔽的信号
    pub mask: SigSet,
    pub flags: SaFlags,
}

impl SigAction {
    pub const DEFAULT: SigAction = SigAction {
        handler: SigHandler::Default,
        mask: SigSet::EMPTY,
        flags: SaFlags::empty(),
    };

    /// 从用户结构解析
    pub fn from_user(raw: &UserSigAction) -> KResult<Self> {
        let flags = SaFlags::from_bits(raw.flags).ok_or(Errno::InvalidArgument)?;
        let handler = match raw.handler {
            SIG_DFL => SigHandler::Default,
            SIG_IGN => SigHandler::Ignore,
            addr if addr as usize >= USER_ADDR_LIMIT => return Err(Errno::InvalidArgument),
            addr if flags.contains(SaFlags::SA_SIGINFO) => {
                SigHandler::HandlerWithInfo(addr as usize)
            }
            addr => SigHandler::Handler(addr as usize),
        };
        Ok(Self {
            handler,
            mask: SigSet::from_bits(raw.mask).without(SIGKILL),
            flags,
        })
    }

    pub fn to_user(&self) -> UserSigAction {
        let handler = match self.handler {
            SigHandler::Default => SIG_DFL,
            SigHandler::Ignore => SIG_IGN,
            SigHandler::Handler(addr) | SigHandler::HandlerWithInfo(addr) => addr as u64,
        };
        UserSigAction {
            handler,
            mask: self.mask.bits(),
            flags: self.flags.bits(),
            _pad: 0,
        }
    }
}

/// 用户 ABI 中的 sigaction 结构
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct UserSigAction {
    pub handler: u64,
    pub mask: u64,
    pub flags: u32,
    pub _pad: u32,
}

impl UserSigAction {
    pub const SIZE: usize = core::mem::size_of::<UserSigAction>();

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let word = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[at..at + 8]);
            u64::from_ne_bytes(b)
        };
        let mut flags = [0u8; 4];
        flags.copy_from_slice(&bytes[16..20]);
        Self {
            handler: word(0),
            mask: word(8),
            flags: u32::from_ne_bytes(flags),
            _pad: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.handler.to_ne_bytes());
        out[8..16].copy_from_slice(&self.mask.to_ne_bytes());
        out[16..20].copy_from_slice(&self.flags.to_ne_bytes());
        out
    }
}

/// 一个待处理信号
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SigInfo {
    pub signo: u32,
    pub value: u64,
}

/// 待处理信号队列
///
/// 定长数组，按到达顺序排列，同一信号最多一项。
#[derive(Debug, Clone)]
pub struct SigQueue {
    entries: [SigInfo; SIG_QUEUE_MAX],
    len: usize,
}

impl SigQueue {
    pub const fn new() -> Self {
        Self {
            entries: [SigInfo { signo: 0, value: 0 }; SIG_QUEUE_MAX],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == SIG_QUEUE_MAX
    }

    pub fn iter(&self) -> impl Iterator<Item = &SigInfo> {
        self.entries[..self.len].iter()
    }

    pub fn contains(&self, signo: u32) -> bool {
        self.iter().any(|e| e.signo == signo)
    }

    /// 追加到队尾；调用者负责去重
    pub fn push(&mut self, info: SigInfo) -> KResult<()> {
        if self.is_full() {
            return Err(Errno::OutOfMemory);
        }
        self.entries[self.len] = info;
        self.len += 1;
        Ok(())
    }

    /// 移除第 `index` 项，保持其余项的顺序
    pub fn remove_at(&mut self, index: usize) -> SigInfo {
        debug_assert!(index < self.len);
        let info = self.entries[index];
        self.entries.copy_within(index + 1..self.len, index);
        self.len -= 1;
        info
    }

    pub fn take(&mut self, signo: u32) -> Option<SigInfo> {
        let index = self.iter().position(|e| e.signo == signo)?;
        Some(self.remove_at(index))
    }

    /// 第一个属于 `set` 的信号
    pub fn first_in(&self, set: SigSet) -> Option<usize> {
        self.iter().position(|e| set.contains(e.signo))
    }

    /// 第一个未被 `mask` 屏蔽的信号（SIGKILL 总是可投递）
    pub fn first_unmasked(&self, mask: SigSet) -> Option<usize> {
        let mask = mask.without(SIGKILL);
        self.iter().position(|e| !mask.contains(e.signo))
    }
}

impl Default for SigQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// 进行中的 sigwait
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SigWait {
    /// 接受的信号
    pub accept: SigSet,
    /// 进入等待前的屏蔽字
    pub saved_mask: SigSet,
    /// 信号编号写回的用户地址
    pub dest: usize,
}

/// 进程的信号状态
#[derive(Debug, Clone)]
pub struct SignalState {
    pub mask: SigSet,
    pub queue: SigQueue,
    /// 注册的异步入口
    pub entry: Option<usize>,
    pub actions: [SigAction; NSIG],
    pub wait: Option<SigWait>,
}

impl SignalState {
    pub fn new() -> Self {
        Self {
            mask: SigSet::EMPTY,
            queue: SigQueue::new(),
            entry: None,
            actions: [SigAction::DEFAULT; NSIG],
            wait: None,
        }
    }

    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.wait.is_some()
    }

    pub fn action(&self, signo: u32) -> &SigAction {
        &self.actions[signo as usize - 1]
    }

    pub fn action_mut(&mut self, signo: u32) -> &mut SigAction {
        &mut self.actions[signo as usize - 1]
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

/// 用户栈上的信号帧
///
/// 入口函数以帧地址为参数被调用，处理完后把同一地址交给 `rt_sigreturn`。
/// 全部字段为 u64，没有填充字节。
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Sigframe {
    /// 被打断时的完整上下文
    pub tf: TrapFrame,
    /// 投递前的屏蔽字
    pub oldmask: u64,
    pub signo: u64,
    pub value: u64,
    pub handler: u64,
    pub flags: u64,
}

impl Sigframe {
    pub const SIZE: usize = core::mem::size_of::<Sigframe>();

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: repr(C)、全部为 u64 字段，无填充字节
        unsafe { core::slice::from_raw_parts(self as *const Self as *const u8, Self::SIZE) }
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        // SAFETY: 任意位模式都是合法的 Sigframe；按非对齐读取
        unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const Sigframe) }
    }
}

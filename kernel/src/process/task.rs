//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程记录
//!
//! 只包含调度、IPC 超时、futex 和信号逻辑会触及的那部分进程状态。
//! 所有字段都在内核锁下修改（见 [`crate::kernel::KernelState`]）。

use alloc::boxed::Box;

use super::Pid;
use crate::arch::TrapFrame;
use crate::mm::AddressSpace;
use crate::signal::SignalState;
use crate::sync::RobustList;
use crate::time::Millis;

/// 进程状态
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcStatus {
    /// 槽位空闲
    Free,
    /// 可运行
    Runnable,
    /// 正在某个 CPU 上运行
    Running,
    /// 阻塞（IPC / futex / sigwait）
    Blocked,
    /// 正在销毁，等待外部回收
    Dying,
}

/// IPC 接收状态
#[derive(Debug, Clone, Default)]
pub struct RecvState {
    /// 是否阻塞在接收中
    pub recving: bool,
    /// 接收截止时间
    pub deadline: Option<Millis>,
    /// 负载缓冲区
    pub dst_va: usize,
    pub max_size: usize,
    /// 最近一次接收的发送者
    pub from: Option<Pid>,
    pub value: u64,
    pub perm: u32,
    /// 实际复制的负载字节数
    pub size: usize,
    /// 最近一次接收以超时结束
    pub timed_out: bool,
}

impl RecvState {
    /// 清除上一次接收的结果
    pub fn clear_result(&mut self) {
        self.from = None;
        self.value = 0;
        self.perm = 0;
        self.size = 0;
    }
}

/// 一条 IPC 消息
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub value: u64,
    pub src_va: usize,
    pub size: usize,
    pub perm: u32,
}

/// IPC 发送状态（仅带超时的发送会进入）
#[derive(Debug, Clone, Default)]
pub struct SendState {
    pub sending: bool,
    pub target: Option<Pid>,
    pub msg: Message,
    pub deadline: Option<Millis>,
}

/// 进程记录
pub struct Process {
    pub pid: Pid,
    pub status: ProcStatus,
    /// 正在其上运行的 CPU
    pub cpu: Option<usize>,
    /// 保存的用户态上下文
    pub tf: TrapFrame,
    pub space: Box<dyn AddressSpace>,
    pub recv: RecvState,
    pub send: SendState,
    pub signal: SignalState,
    /// 正在等待的 futex 地址（等待节点在对应桶里）
    pub futex_wait: Option<usize>,
    pub robust: Option<RobustList>,
    /// 被调度运行的次数
    pub runs: u64,
}

impl Process {
    pub fn new(pid: Pid, space: Box<dyn AddressSpace>, tf: TrapFrame) -> Self {
        Self {
            pid,
            status: ProcStatus::Runnable,
            cpu: None,
            tf,
            space,
            recv: RecvState::default(),
            send: SendState::default(),
            signal: SignalState::new(),
            futex_wait: None,
            robust: None,
            runs: 0,
        }
    }

    /// 阻塞在某个有截止时间的 IPC 调用上
    pub fn has_pending_deadline(&self) -> bool {
        self.status == ProcStatus::Blocked
            && ((self.recv.recving && self.recv.deadline.is_some())
                || (self.send.sending && self.send.deadline.is_some()))
    }

    /// 唤醒阻塞的系统调用，`ret` 作为其返回值
    pub fn wake_with(&mut self, ret: u64) {
        debug_assert_eq!(self.status, ProcStatus::Blocked);
        self.tf.set_return(ret);
        self.status = ProcStatus::Runnable;
    }
}

//! Rux 同步核心配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 内核名称
pub const KERNEL_NAME: &str = "Rux";

/// 内核版本
pub const KERNEL_VERSION: &str = "0.1.0";

/// 目标平台
pub const TARGET_PLATFORM: &str = "riscv64";

// ============================================================
// SMP / 进程表配置
// ============================================================

/// 最大CPU数量
pub const MAX_CPUS: usize = 4;

/// 进程表槽位数的位宽
pub const LOG2NPROC: u32 = 8;

/// 进程表槽位数
pub const NPROC: usize = 1 << LOG2NPROC;

// ============================================================
// 内存配置
// ============================================================

/// 页大小
pub const PAGE_SIZE: usize = 4096;

/// 用户地址空间上限（不含）
pub const USER_ADDR_LIMIT: usize = 274877906944;

// ============================================================
// Futex 配置
// ============================================================

/// 是否启用 futex
pub const ENABLE_FUTEX: bool = true;

/// futex 哈希桶数量
pub const FUTEX_HASH_SIZE: usize = 256;

/// robust list 最大遍历长度
pub const ROBUST_LIST_LIMIT: usize = 2048;

// ============================================================
// 信号配置
// ============================================================

/// 是否启用信号处理
pub const ENABLE_SIGNAL: bool = true;

/// 信号数量（合法编号 1..=NSIG）
pub const NSIG: usize = 64;

/// 每进程待处理信号队列容量
pub const SIG_QUEUE_MAX: usize = 32;

/// 信号帧对齐
pub const SIGFRAME_ALIGN: usize = 16;

// ============================================================
// IPC 配置
// ============================================================

/// 是否启用 IPC 超时扫描
pub const ENABLE_IPC_TIMEOUT: bool = true;

/// 周期性 IPC 超时扫描间隔 (毫秒)
pub const IPC_SWEEP_INTERVAL_MS: u64 = 500;

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

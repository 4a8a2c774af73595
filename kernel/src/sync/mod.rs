//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 同步原语
//!
//! - futex：按用户地址散列的等待/唤醒
//! - robust：进程死亡时释放其持有的 futex 锁

pub mod futex;
pub mod robust;

pub use futex::{futex_hash, FutexTable, FUTEX_WAIT, FUTEX_WAKE};
pub use robust::{
    collect_robust_futexes, mark_owner_died, set_robust_list, RobustList, FUTEX_OWNER_DIED,
    FUTEX_TID_MASK, FUTEX_WAITERS,
};

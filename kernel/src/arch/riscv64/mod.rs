//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! RISC-V 64位架构支持
//!
//! 支持 RISC-V 64位 (RV64GC) 架构

pub mod trap;

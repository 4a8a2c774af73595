//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内核日志
//!
//! `log` 门面的内核实现。控制台驱动在本核心之外，
//! 通过 [`ConsoleSink`] 接入；每条记录输出为一行 `[LEVEL target] message`。

use core::fmt::{self, Write};
use spin::Once;

use crate::config::LOG_LEVEL;

/// 日志输出目标（串口/SBI 控制台）
pub trait ConsoleSink: Sync {
    fn write_str(&self, s: &str);
}

struct SinkWriter<'a>(&'a dyn ConsoleSink);

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

struct KernelLogger {
    sink: Once<&'static dyn ConsoleSink>,
}

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            let _ = writeln!(
                SinkWriter(*sink),
                "[{:5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger { sink: Once::new() };

/// 生效的最大日志级别
pub fn max_level() -> log::LevelFilter {
    if cfg!(feature = "debug_log") {
        log::LevelFilter::Trace
    } else {
        LOG_LEVEL
    }
}

/// 安装内核日志，只能成功一次
pub fn init(sink: &'static dyn ConsoleSink) -> Result<(), log::SetLoggerError> {
    LOGGER.sink.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level());
    Ok(())
}

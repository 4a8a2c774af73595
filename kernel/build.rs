//! Rux 同步核心构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Kernel.toml 配置文件（或 menuconfig 生成的 build/.config）
//! 2. 生成 src/config.rs 配置常量

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// 解析 build/.config 文件（简单 key=value 格式）
fn parse_dot_config(content: &str) -> toml::Value {
    let mut sections: HashMap<String, HashMap<String, toml::Value>> = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // section_key=value，使用第一个下划线分割 section
        if let Some(eq_pos) = line.find('=') {
            let key = &line[..eq_pos];
            let value = line[eq_pos + 1..].trim();

            if let Some(underscore_pos) = key.find('_') {
                let section = &key[..underscore_pos];
                let config_key = &key[underscore_pos + 1..];

                let parsed_value = if value == "true" {
                    toml::Value::Boolean(true)
                } else if value == "false" {
                    toml::Value::Boolean(false)
                } else if let Ok(int_val) = value.parse::<i64>() {
                    toml::Value::Integer(int_val)
                } else {
                    toml::Value::String(value.trim_matches('"').to_string())
                };

                sections
                    .entry(section.to_string())
                    .or_default()
                    .insert(config_key.to_string(), parsed_value);
            }
        }
    }

    let mut root_map = toml::map::Map::new();
    for (section_name, section_data) in sections {
        let mut toml_map = toml::map::Map::new();
        for (k, v) in section_data {
            toml_map.insert(k, v);
        }
        root_map.insert(section_name, toml::Value::Table(toml_map));
    }

    toml::Value::Table(root_map)
}

fn main() {
    println!("cargo:rerun-if-changed=../Kernel.toml");
    println!("cargo:rerun-if-changed=../build/.config");

    // build/.config 优先，其次 Kernel.toml，都没有时使用默认值
    let config_content = if let Ok(content) = fs::read_to_string("../build/.config") {
        println!("cargo:warning=Using build/.config configuration");
        content
    } else {
        fs::read_to_string("../Kernel.toml").unwrap_or_default()
    };

    let is_toml = config_content.lines().any(|line| {
        let trimmed = line.trim();
        trimmed.starts_with('[') && trimmed.ends_with(']')
    });

    let config = if is_toml {
        toml::from_str(&config_content).expect("配置文件解析失败")
    } else {
        parse_dot_config(&config_content)
    };

    let platform = get_str(&config, "platform", "default_platform", "riscv64");
    println!("cargo:rustc-env=RUX_TARGET_PLATFORM={}", platform);

    let log_level = get_str(&config, "debug", "log_level", "info");
    println!("cargo:rustc-env=RUX_LOG_LEVEL={}", log_level);

    generate_config_code(&config);
}

fn get_int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn get_bool(config: &toml::Value, section: &str, key: &str, default: bool) -> bool {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

fn get_str<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

fn generate_config_code(config: &toml::Value) {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());

    let log2_nproc = get_int(config, "process", "log2_nproc", 8).clamp(1, 16);
    let page_size = get_int(config, "memory", "page_size", 4096);
    let log_level = match get_str(config, "debug", "log_level", "info") {
        "error" => "Error",
        "warn" => "Warn",
        "debug" => "Debug",
        "trace" => "Trace",
        _ => "Info",
    };

    let config_header = format!(
        r#"//! Rux 同步核心配置（自动生成）
//!
//! 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

// ============================================================
// 基本信息
// ============================================================

/// 内核名称
pub const KERNEL_NAME: &str = "{}";

/// 内核版本
pub const KERNEL_VERSION: &str = "{}";

/// 目标平台
pub const TARGET_PLATFORM: &str = "{}";

// ============================================================
// SMP / 进程表配置
// ============================================================

/// 最大CPU数量
pub const MAX_CPUS: usize = {};

/// 进程表槽位数的位宽
pub const LOG2NPROC: u32 = {};

/// 进程表槽位数
pub const NPROC: usize = 1 << LOG2NPROC;

// ============================================================
// 内存配置
// ============================================================

/// 页大小
pub const PAGE_SIZE: usize = {};

/// 用户地址空间上限（不含）
pub const USER_ADDR_LIMIT: usize = {};

// ============================================================
// Futex 配置
// ============================================================

/// 是否启用 futex
pub const ENABLE_FUTEX: bool = {};

/// futex 哈希桶数量
pub const FUTEX_HASH_SIZE: usize = {};

/// robust list 最大遍历长度
pub const ROBUST_LIST_LIMIT: usize = {};

// ============================================================
// 信号配置
// ============================================================

/// 是否启用信号处理
pub const ENABLE_SIGNAL: bool = {};

/// 信号数量（合法编号 1..=NSIG）
pub const NSIG: usize = {};

/// 每进程待处理信号队列容量
pub const SIG_QUEUE_MAX: usize = {};

/// 信号帧对齐
pub const SIGFRAME_ALIGN: usize = {};

// ============================================================
// IPC 配置
// ============================================================

/// 是否启用 IPC 超时扫描
pub const ENABLE_IPC_TIMEOUT: bool = {};

/// 周期性 IPC 超时扫描间隔 (毫秒)
pub const IPC_SWEEP_INTERVAL_MS: u64 = {};

// ============================================================
// 调试配置
// ============================================================

/// 默认日志级别
pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::{};
"#,
        get_str(config, "general", "name", "Rux"),
        get_str(config, "general", "version", "0.1.0"),
        get_str(config, "platform", "default_platform", "riscv64"),
        get_int(config, "smp", "max_cpus", 4),
        log2_nproc,
        page_size,
        get_int(config, "memory", "user_addr_limit", 0x40_0000_0000),
        get_bool(config, "futex", "enable_futex", true),
        get_int(config, "futex", "hash_size", 256),
        get_int(config, "futex", "robust_list_limit", 2048),
        get_bool(config, "signal", "enable_signal", true),
        get_int(config, "signal", "nsig", 64).clamp(1, 64),
        get_int(config, "signal", "queue_max", 32),
        get_int(config, "signal", "frame_align", 16),
        get_bool(config, "ipc", "enable_ipc_timeout", true),
        get_int(config, "ipc", "sweep_interval_ms", 500),
        log_level,
    );

    let config_file = manifest_dir.join("src").join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_header {
        fs::write(&config_file, &config_header).expect("写入配置文件失败");
    }
}

//! # 日志记录模块
//!
//! 使用 `log` 门面记录，`env_logger` 作为后端。
//! 输出级别、控制台 / 文件目标都来自 `LoggingConfig`。
//!
//! ## 日志分类
//! - **网络失败**: 接口请求、推送通道、连通性探测
//! - **数据结构异常**: 服务端响应不符合预期，界面已重置为空状态
//! - **导出失败**: 报告文件写入或分享失败
//! - **用户操作**: 登录、登出、导出等
//! - **配置警告**: 配置文件缺失或取值被忽略

use chrono::Local;
use env_logger::{Builder, Target};
use std::fs::OpenOptions;
use std::io::Write;

use crate::utils::config::LoggingConfig;
use crate::utils::error::{AppError, AppResult};

/// 记录网络失败日志
#[macro_export]
macro_rules! log_network_failure {
    ($msg:expr) => {
        log::error!("[网络失败] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::error!("[网络失败] {}", format!($msg, $($arg)*));
    };
}

/// 记录响应数据结构异常日志
#[macro_export]
macro_rules! log_data_shape_failure {
    ($msg:expr) => {
        log::error!("[数据结构异常] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::error!("[数据结构异常] {}", format!($msg, $($arg)*));
    };
}

/// 记录报告导出失败日志
#[macro_export]
macro_rules! log_export_failure {
    ($msg:expr) => {
        log::error!("[导出失败] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::error!("[导出失败] {}", format!($msg, $($arg)*));
    };
}

/// 记录用户操作日志
#[macro_export]
macro_rules! log_user_operation {
    ($msg:expr) => {
        log::info!("[用户操作] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::info!("[用户操作] {}", format!($msg, $($arg)*));
    };
}

/// 记录配置警告
#[macro_export]
macro_rules! log_config_warning {
    ($msg:expr) => {
        log::warn!("[配置警告] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::warn!("[配置警告] {}", format!($msg, $($arg)*));
    };
}

pub use log_config_warning;
pub use log_data_shape_failure;
pub use log_export_failure;
pub use log_network_failure;
pub use log_user_operation;

/// 按配置构建日志后端（不安装为全局 logger）
pub fn build_logger(config: &LoggingConfig) -> AppResult<Builder> {
    let mut builder = Builder::new();
    builder.parse_filters(&config.log_level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    match &config.log_file_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AppError::io_error(format!("打开日志文件失败 {:?}", path), e.to_string()))?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None if config.console_output => {
            builder.target(Target::Stderr);
        }
        None => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }

    Ok(builder)
}

/// 初始化全局日志；重复初始化时保留已有的 logger
pub fn init_logger(config: &LoggingConfig) -> AppResult<()> {
    let mut builder = build_logger(config)?;
    if builder.try_init().is_err() {
        log::debug!("日志系统已初始化，忽略重复初始化");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_target_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("monitor.log");
        let config = LoggingConfig {
            log_level: "debug".into(),
            log_file_path: Some(path.clone()),
            console_output: false,
        };
        assert!(build_logger(&config).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_init_logger_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logger(&config).is_ok());
        assert!(init_logger(&config).is_ok());
        crate::log_user_operation!("测试日志 {}", 1);
    }
}

/// 生产监控看板客户端核心库
pub mod models;
pub mod utils;
pub mod logging;
pub mod services;
pub mod commands;
pub mod error;

// 重新导出常用类型，方便使用
pub use models::*;
pub use utils::{AppError, AppResult, AppConfig, ConfigManager};
pub use services::*;
pub use commands::{AppState, SystemStatus, init_app_state};

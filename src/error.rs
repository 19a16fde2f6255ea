/// 错误处理模块
///
/// 本模块是应用程序错误处理的统一入口点，
/// 通过重新导出 utils::error 中的错误类型简化导入路径：
///
/// ```rust
/// use monitor_lib::error::{AppError, AppResult};
///
/// fn some_function() -> AppResult<String> {
///     Ok("success".to_string())
/// }
/// ```

pub use crate::utils::error::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序统一错误类型
/// 用于封装客户端核心可能出现的各种错误，提供统一的错误处理机制
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// 通用错误，包含错误消息
    #[error("通用错误: {message}")]
    Generic { message: String },

    /// 输入/输出错误
    #[error("IO错误: {message} (Kind: {kind})")]
    IoError { message: String, kind: String },

    /// 网络不可用
    ///
    /// **业务含义**: 设备当前没有网络连接
    /// **处理策略**:
    /// - 阻止当前操作并提示用户
    /// - 不跳转登录页，也不清除已保存的令牌
    #[error("网络不可用: {message}")]
    NetworkUnavailable { message: String },

    /// 认证失效（令牌缺失或被服务端拒绝）
    ///
    /// **处理策略**: 仅在确认网络可用时跳转到登录页
    #[error("认证失效: {message}")]
    AuthInvalid { message: String },

    /// 服务端响应结构不符合预期
    ///
    /// **处理策略**: 记录日志并把界面重置为空状态，不向上抛出
    #[error("响应数据结构异常: {context} - {message}")]
    DataShapeUnexpected { context: String, message: String },

    /// 报告导出失败（文件写入或分享失败）
    #[error("报告导出失败: {message}")]
    ExportFailure { message: String },

    /// 网络请求错误（连接、超时、HTTP状态码等）
    #[error("网络错误: {message}")]
    NetworkError { message: String },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    ConfigurationError { message: String },

    /// 验证错误（数据验证失败）
    #[error("验证错误: {message}")]
    ValidationError { message: String },

    /// JSON序列化/反序列化错误
    #[error("JSON序列化/反序列化错误: {message}")]
    JsonError { message: String },

    /// 模板引擎错误
    #[error("模板引擎错误: {message}")]
    TemplateError { message: String },

    /// PDF生成错误
    #[error("PDF生成错误: {message}")]
    PdfError { message: String },

    /// CSV生成错误
    #[error("CSV生成错误: {message}")]
    CsvError { message: String },
}

impl AppError {
    /// 创建通用错误
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// 创建IO错误
    pub fn io_error(message: impl Into<String>, kind_str: impl Into<String>) -> Self {
        Self::IoError {
            message: message.into(),
            kind: kind_str.into(),
        }
    }

    /// 创建网络不可用错误
    pub fn network_unavailable(message: impl Into<String>) -> Self {
        Self::NetworkUnavailable {
            message: message.into(),
        }
    }

    /// 创建认证失效错误
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::AuthInvalid {
            message: message.into(),
        }
    }

    /// 创建响应结构异常错误
    ///
    /// **参数**:
    /// - `context` - 出错的接口或数据位置，例如 `dashboard.groups[0]`
    /// - `message` - 具体缺失或类型不符的描述
    pub fn data_shape_unexpected(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataShapeUnexpected {
            context: context.into(),
            message: message.into(),
        }
    }

    /// 创建报告导出失败错误
    pub fn export_failure(message: impl Into<String>) -> Self {
        Self::ExportFailure {
            message: message.into(),
        }
    }

    /// 创建网络错误
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// 创建JSON序列化错误
    pub fn json_error(message: impl Into<String>) -> Self {
        Self::JsonError {
            message: message.into(),
        }
    }

    /// 创建模板引擎错误
    pub fn template_error(message: impl Into<String>) -> Self {
        Self::TemplateError {
            message: message.into(),
        }
    }

    /// 创建PDF生成错误
    pub fn pdf_error(message: impl Into<String>) -> Self {
        Self::PdfError {
            message: message.into(),
        }
    }

    /// 创建CSV生成错误
    pub fn csv_error(message: impl Into<String>) -> Self {
        Self::CsvError {
            message: message.into(),
        }
    }

    /// 是否属于认证失效
    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, AppError::AuthInvalid { .. })
    }

    /// 是否属于网络不可用
    pub fn is_network_unavailable(&self) -> bool {
        matches!(self, AppError::NetworkUnavailable { .. })
    }

    /// 获取错误的简短描述
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Generic { .. } => "GENERIC",
            AppError::IoError { .. } => "IO_ERROR",
            AppError::NetworkUnavailable { .. } => "NETWORK_UNAVAILABLE",
            AppError::AuthInvalid { .. } => "AUTH_INVALID",
            AppError::DataShapeUnexpected { .. } => "DATA_SHAPE_UNEXPECTED",
            AppError::ExportFailure { .. } => "EXPORT_FAILURE",
            AppError::NetworkError { .. } => "NETWORK_ERROR",
            AppError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::JsonError { .. } => "JSON_ERROR",
            AppError::TemplateError { .. } => "TEMPLATE_ERROR",
            AppError::PdfError { .. } => "PDF_ERROR",
            AppError::CsvError { .. } => "CSV_ERROR",
        }
    }
}

/// 标准 I/O 错误到 AppError 的转换
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError { message: err.to_string(), kind: format!("{:?}", err.kind()) }
    }
}

/// serde_json 错误到 AppError 的转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError { message: err.to_string() }
    }
}

/// 字符串错误到 AppError 的转换（通用错误）
impl From<String> for AppError {
    fn from(err_msg: String) -> Self {
        Self::Generic { message: err_msg }
    }
}

/// &str 错误到 AppError 的转换（通用错误）
impl From<&str> for AppError {
    fn from(err_msg: &str) -> Self {
        Self::Generic { message: err_msg.to_string() }
    }
}

/// reqwest 错误到 AppError 的转换
///
/// **转换逻辑**:
/// - 连接失败 / 超时：归为网络错误，调用方会再次探测网络决定是否提示离线
/// - 401 / 403：归为认证失效
/// - 响应体解码失败：归为响应结构异常
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return AppError::auth_invalid(format!("服务端拒绝令牌: {}", status));
            }
        }
        if err.is_decode() {
            return AppError::data_shape_unexpected("http.body", err.to_string());
        }
        AppError::NetworkError { message: err.to_string() }
    }
}

/// tera 模板错误到 AppError 的转换
impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError::TemplateError { message: format!("Template error: {}", err) }
    }
}

/// csv 错误到 AppError 的转换
impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::CsvError { message: format!("CSV error: {}", err) }
    }
}

/// config 加载错误到 AppError 的转换
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigurationError { message: err.to_string() }
    }
}

/// WebSocket 错误到 AppError 的转换
impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::NetworkError { message: format!("WebSocket error: {}", err) }
    }
}

/// 应用程序结果类型别名
/// 简化错误处理的类型定义
pub type AppResult<T> = Result<T, AppError>;

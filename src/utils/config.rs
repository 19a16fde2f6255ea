use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::log_config_warning;
use crate::utils::error::{AppError, AppResult};

/// 环境变量前缀，例如 `MONITOR__API_CONFIG__BASE_URL`
pub const ENV_PREFIX: &str = "MONITOR";

/// 应用程序主配置结构
/// 包含客户端运行所需的所有配置信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 应用程序基本设置
    pub app_settings: AppSettings,
    /// 远程接口配置
    pub api_config: ApiConfig,
    /// 轮询配置
    pub polling_config: PollingConfig,
    /// 网络探测配置
    pub network_config: NetworkConfig,
    /// 日志配置
    pub logging_config: LoggingConfig,
    /// 本地存储配置
    pub storage_config: StorageConfig,
}

/// 应用程序基本设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// 应用程序名称
    pub app_name: String,
    /// 应用程序版本
    pub app_version: String,
    /// 运行环境 (development, testing, production)
    pub environment: String,
}

/// 远程接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST 接口根地址
    pub base_url: String,
    /// 实时推送通道地址（为空则只使用轮询）
    pub websocket_url: Option<String>,
    /// 单次请求超时时间（毫秒）
    pub request_timeout_ms: u64,
    /// 单台机器报告与产量汇总接口是否携带令牌
    #[serde(default)]
    pub authenticate_report_endpoints: bool,
    /// 各接口路径
    pub endpoints: EndpointPaths,
}

/// 各接口路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointPaths {
    pub login: String,
    pub token_check: String,
    pub dashboard: String,
    pub machine_report: String,
    pub hourly_report: String,
    pub production: String,
    pub machines: String,
}

/// 轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// 看板轮询间隔（毫秒）
    pub dashboard_interval_ms: u64,
    /// 实时报告轮询间隔（毫秒）
    pub live_report_interval_ms: u64,
    /// 产量页面轮询间隔（毫秒）
    pub production_interval_ms: u64,
    /// 产量页面防抖静默期（毫秒）
    pub production_debounce_ms: u64,
}

/// 网络探测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// 探测主机，为空时使用 base_url 的主机
    pub probe_host: Option<String>,
    /// 探测端口，为空时使用 base_url 的端口
    pub probe_port: Option<u16>,
    /// 探测超时时间（毫秒）
    pub probe_timeout_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 日志文件路径
    pub log_file_path: Option<PathBuf>,
    /// 是否启用控制台输出
    pub console_output: bool,
}

/// 本地存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 令牌与用户信息文件
    pub token_file: PathBuf,
    /// 报告导出目录
    pub export_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_settings: AppSettings::default(),
            api_config: ApiConfig::default(),
            polling_config: PollingConfig::default(),
            network_config: NetworkConfig::default(),
            logging_config: LoggingConfig::default(),
            storage_config: StorageConfig::default(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: "ProductionMonitor".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            websocket_url: None,
            request_timeout_ms: 15000,
            authenticate_report_endpoints: false,
            endpoints: EndpointPaths::default(),
        }
    }
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            login: "/api/login".to_string(),
            token_check: "/api/token-check".to_string(),
            dashboard: "/api/dashboard".to_string(),
            machine_report: "/api/machine-report".to_string(),
            hourly_report: "/api/hourly-report".to_string(),
            production: "/api/production".to_string(),
            machines: "/api/machines".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            dashboard_interval_ms: 20000,
            live_report_interval_ms: 20000,
            production_interval_ms: 3000,
            production_debounce_ms: 500,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_host: None,
            probe_port: None,
            probe_timeout_ms: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file_path: None,
            console_output: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("data/session.json"),
            export_dir: PathBuf::from("exports"),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl PollingConfig {
    pub fn dashboard_interval(&self) -> Duration {
        Duration::from_millis(self.dashboard_interval_ms)
    }

    pub fn live_report_interval(&self) -> Duration {
        Duration::from_millis(self.live_report_interval_ms)
    }

    pub fn production_interval(&self) -> Duration {
        Duration::from_millis(self.production_interval_ms)
    }

    pub fn production_debounce(&self) -> Duration {
        Duration::from_millis(self.production_debounce_ms)
    }
}

/// 配置管理器
/// 负责加载、保存和管理应用程序配置
///
/// 加载顺序：默认值 → 配置文件（可选） → 环境变量
pub struct ConfigManager {
    config: AppConfig,
    config_file_path: PathBuf,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_file_path: PathBuf) -> Self {
        Self {
            config: AppConfig::default(),
            config_file_path,
        }
    }

    /// 从文件和环境变量加载配置
    pub fn load(&mut self) -> AppResult<()> {
        if !self.config_file_path.exists() {
            log_config_warning!("配置文件不存在，使用默认值与环境变量: {:?}", self.config_file_path);
        }
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(self.config_file_path.clone()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        self.config = settings
            .try_deserialize()
            .map_err(|e| AppError::configuration_error(format!("解析配置失败: {}", e)))?;

        log::debug!("配置已加载: {:?}", self.config_file_path);
        Ok(())
    }

    /// 将配置保存到文件
    pub async fn save_to_file(&self) -> AppResult<()> {
        // 确保目录存在
        if let Some(parent) = self.config_file_path.parent() {
            tokio::fs::create_dir_all(parent).await
                .map_err(|e| AppError::io_error(format!("创建配置目录失败: {}", e), e.kind().to_string()))?;
        }

        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| AppError::json_error(format!("序列化配置失败: {}", e)))?;

        tokio::fs::write(&self.config_file_path, content)
            .await
            .map_err(|e| AppError::io_error(format!("写入配置文件失败: {}", e), e.kind().to_string()))?;

        Ok(())
    }

    /// 获取配置的只读引用
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取配置的可变引用
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    /// 验证配置的有效性
    pub fn validate_config(&self) -> AppResult<()> {
        let api = &self.config.api_config;
        if url::Url::parse(&api.base_url).is_err() {
            return Err(AppError::configuration_error(format!("无效的接口地址: {}", api.base_url)));
        }

        if let Some(ws) = &api.websocket_url {
            match url::Url::parse(ws) {
                Ok(parsed) if parsed.scheme() == "ws" || parsed.scheme() == "wss" => {}
                _ => return Err(AppError::configuration_error(format!("无效的推送通道地址: {}", ws))),
            }
        }

        let polling = &self.config.polling_config;
        if polling.dashboard_interval_ms == 0
            || polling.live_report_interval_ms == 0
            || polling.production_interval_ms == 0
        {
            return Err(AppError::configuration_error("轮询间隔不能为0"));
        }
        if polling.production_debounce_ms >= polling.production_interval_ms {
            log_config_warning!(
                "产量汇总防抖时间 {}ms 不小于轮询间隔 {}ms，手动刷新将不早于下一次定时拉取",
                polling.production_debounce_ms,
                polling.production_interval_ms
            );
        }

        // 验证环境配置
        let valid_environments = ["development", "testing", "production"];
        if !valid_environments.contains(&self.config.app_settings.environment.as_str()) {
            return Err(AppError::configuration_error(format!(
                "无效的环境配置: {}，有效值: {:?}",
                self.config.app_settings.environment, valid_environments
            )));
        }

        // 验证日志级别
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging_config.log_level.as_str()) {
            return Err(AppError::configuration_error(format!(
                "无效的日志级别: {}，有效值: {:?}",
                self.config.logging_config.log_level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// 重置为默认配置
    pub fn reset_to_default(&mut self) {
        self.config = AppConfig::default();
    }
}

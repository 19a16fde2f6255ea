/// 命令模块
///
/// 定义命令行入口可以调用的全部操作，所有服务实例集中在 `AppState` 中

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::models::{DownloadState, ExportFormat, MachineInfo, Screen, UserProfile};
use crate::services::application::{
    DashboardScreen, LiveReportScreen, PollerConfig, ProductionScreen, ReportDownloadService,
    ReportRequest, ReportSelection, Session, SessionGate,
};
use crate::services::infrastructure::{
    DirectoryExportSink, ExportedFile, HttpProductionApi, IExportSink, INetworkMonitor,
    IProductionApi, ITokenStore, IUserNotifier, JsonTokenStore, LiveUpdateChannel, LogNotifier,
    RecordingNavigator, TcpConnectivityProbe,
};
use crate::services::traits::BaseService;
use crate::utils::config::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// 应用状态，包含所有服务实例
pub struct AppState {
    config: AppConfig,
    api: Arc<dyn IProductionApi>,
    gate: Arc<SessionGate>,
    network: Arc<dyn INetworkMonitor>,
    notifier: Arc<dyn IUserNotifier>,
    navigator: Arc<RecordingNavigator>,
    downloads: ReportDownloadService,
    live: Option<LiveUpdateChannel>,
}

impl AppState {
    /// 按配置创建全部服务
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let api: Arc<dyn IProductionApi> = Arc::new(HttpProductionApi::new(&config.api_config)?);
        let store: Arc<dyn ITokenStore> = Arc::new(JsonTokenStore::new(config.storage_config.token_file.clone()));
        let network: Arc<dyn INetworkMonitor> = Arc::new(TcpConnectivityProbe::from_config(&config)?);
        let sink: Arc<dyn IExportSink> = Arc::new(DirectoryExportSink::new(config.storage_config.export_dir.clone()));
        let live = config
            .api_config
            .websocket_url
            .as_deref()
            .map(LiveUpdateChannel::new)
            .transpose()?;

        Ok(Self::with_services(config, api, store, network, sink, live))
    }

    /// 使用给定的基础设施实现组装应用状态
    pub fn with_services(
        config: AppConfig,
        api: Arc<dyn IProductionApi>,
        store: Arc<dyn ITokenStore>,
        network: Arc<dyn INetworkMonitor>,
        sink: Arc<dyn IExportSink>,
        live: Option<LiveUpdateChannel>,
    ) -> Self {
        let notifier: Arc<dyn IUserNotifier> = Arc::new(LogNotifier);
        let navigator = Arc::new(RecordingNavigator::new());
        let session = Arc::new(Session::new(store));
        let gate = Arc::new(SessionGate::new(session, api.clone(), network.clone(), notifier.clone()));
        let downloads = ReportDownloadService::new(
            api.clone(),
            gate.clone(),
            navigator.clone(),
            sink,
            notifier.clone(),
        );

        Self { config, api, gate, network, notifier, navigator, downloads, live }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<SessionGate> {
        &self.gate
    }

    pub fn navigator(&self) -> &Arc<RecordingNavigator> {
        &self.navigator
    }

    pub fn downloads(&self) -> &ReportDownloadService {
        &self.downloads
    }

    /// 推送通道，未配置地址时为 `None`
    pub fn live(&self) -> Option<&LiveUpdateChannel> {
        self.live.as_ref()
    }

    /// 上一次会话校验后是否被要求重新登录
    pub fn login_required(&self) -> bool {
        self.navigator.last() == Some(Screen::Login)
    }

    pub fn dashboard_screen(&self) -> DashboardScreen {
        DashboardScreen::new(
            self.api.clone(),
            self.gate.clone(),
            self.navigator.clone(),
            self.notifier.clone(),
            PollerConfig::fixed(self.config.polling_config.dashboard_interval()),
        )
    }

    pub fn live_report_screen(&self, selection: ReportSelection) -> LiveReportScreen {
        LiveReportScreen::new(
            self.api.clone(),
            selection,
            self.gate.clone(),
            self.navigator.clone(),
            self.notifier.clone(),
            PollerConfig::fixed(self.config.polling_config.live_report_interval()),
        )
    }

    pub fn production_screen(&self, date: impl Into<String>) -> ProductionScreen {
        let polling = &self.config.polling_config;
        ProductionScreen::new(
            self.api.clone(),
            date,
            self.gate.clone(),
            self.navigator.clone(),
            self.notifier.clone(),
            PollerConfig::debounced(polling.production_interval(), polling.production_debounce()),
        )
    }

    fn storage_dirs(&self) -> Vec<PathBuf> {
        let storage = &self.config.storage_config;
        let mut dirs = vec![storage.export_dir.clone()];
        if let Some(parent) = storage.token_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            dirs.push(parent.to_path_buf());
        }
        dirs
    }
}

#[async_trait]
impl BaseService for AppState {
    fn service_name(&self) -> &'static str {
        "AppState"
    }

    async fn initialize(&mut self) -> AppResult<()> {
        for dir in self.storage_dirs() {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| AppError::io_error(format!("创建目录失败 {:?}: {}", dir, e), e.kind().to_string()))?;
        }
        info!(
            "[AppState] {} {} 已初始化，服务地址: {}",
            self.config.app_settings.app_name, self.config.app_settings.app_version, self.config.api_config.base_url
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> AppResult<()> {
        info!("[AppState] 已关闭");
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        if self.network.is_connected().await {
            Ok(())
        } else {
            Err(AppError::network_unavailable("无法连接到服务端"))
        }
    }
}

/// 创建并初始化应用状态
pub async fn init_app_state(config: AppConfig) -> AppResult<AppState> {
    let mut state = AppState::new(config)?;
    state.initialize().await?;
    Ok(state)
}

/// 系统状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub network_connected: bool,
    pub session_valid: bool,
    pub user: UserProfile,
    pub download_state: DownloadState,
}

// ============================================================================
// 会话相关命令
// ============================================================================

/// 登录并保存令牌
pub async fn login(state: &AppState, user_name: &str, password: &str) -> AppResult<UserProfile> {
    state.gate.login(user_name, password).await
}

/// 清除令牌与用户信息
pub async fn logout(state: &AppState) -> AppResult<()> {
    state.gate.logout().await
}

/// 获取系统状态
pub async fn system_status(state: &AppState) -> AppResult<SystemStatus> {
    let network_connected = state.network.is_connected().await;
    let session_valid = network_connected && state.gate.check_token().await;
    Ok(SystemStatus {
        network_connected,
        session_valid,
        user: state.gate.session().profile().await?,
        download_state: state.downloads.state(),
    })
}

// ============================================================================
// 数据相关命令
// ============================================================================

/// 机器列表
pub async fn list_machines(state: &AppState) -> AppResult<Vec<MachineInfo>> {
    let token = state.gate.ensure_session(state.navigator.as_ref()).await?;
    state.api.fetch_machines(&token).await
}

/// 下载报告
pub async fn export_report(state: &AppState, request: ReportRequest, format: ExportFormat) -> AppResult<ExportedFile> {
    state.downloads.download(request, format).await
}

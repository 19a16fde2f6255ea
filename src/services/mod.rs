/// 服务层模块
/// 包含所有业务逻辑和基础设施服务

/// 服务生命周期trait
pub mod traits;

/// 基础设施层服务 (外部系统交互)
pub mod infrastructure;

/// 领域服务层 (核心业务逻辑)
pub mod domain;

/// 应用层服务 (页面与下载流程)
pub mod application;

// 重新导出常用类型
pub use traits::BaseService;
pub use infrastructure::{
    DirectoryExportSink, HttpProductionApi, IExportSink, ILiveUpdateSource, INavigator,
    INetworkMonitor, IProductionApi, ITokenStore, IUserNotifier, JsonTokenStore, LiveUpdateChannel,
    LogNotifier, RecordingNavigator, TcpConnectivityProbe,
};
pub use domain::{build_report_table, efficiency_band, ReportData, ReportTable};
pub use application::{
    DashboardScreen, LiveReportScreen, ProductionScreen, ReportDownloadService, ReportRequest,
    Session, SessionGate,
};

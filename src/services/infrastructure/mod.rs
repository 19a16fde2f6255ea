/// 基础设施层服务模块
/// 负责与外部系统的交互：远程接口、实时推送、本地存储、文件导出

/// 远程 REST 接口
pub mod api_client;

/// WebSocket 实时推送
pub mod live_channel;

/// 令牌键值存储
pub mod token_store;

/// 网络连通性探测
pub mod network_monitor;

/// 报告文件导出
pub mod export_sink;

/// 导航与用户提示
pub mod ui_bridge;

pub use api_client::{HttpProductionApi, IProductionApi};
pub use live_channel::{decode_frame, ILiveUpdateSource, LiveEvent, LiveUpdateChannel};
pub use token_store::{ITokenStore, JsonTokenStore, MemoryTokenStore};
pub use network_monitor::{INetworkMonitor, TcpConnectivityProbe};
pub use export_sink::{DirectoryExportSink, ExportPayload, ExportedFile, IExportSink};
pub use ui_bridge::{INavigator, IUserNotifier, LogNotifier, RecordingNavigator};

#[cfg(test)]
pub use api_client::MockIProductionApi;
#[cfg(test)]
pub use token_store::MockITokenStore;
#[cfg(test)]
pub use network_monitor::MockINetworkMonitor;
#[cfg(test)]
pub use export_sink::MockIExportSink;
#[cfg(test)]
pub use ui_bridge::{MockINavigator, MockIUserNotifier};

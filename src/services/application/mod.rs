/// 应用层服务模块
///
/// 应用层负责把会话、轮询、领域计算和基础设施组合成页面与下载流程

/// 会话与会话守卫
pub mod session;

/// 轮询器
pub mod poller;

/// 页面状态
pub mod screen_state;

/// 受监控页面（会话校验 → 拉取 → 写回）
pub mod monitored_screen;

/// 看板页面
pub mod dashboard_screen;

/// 实时报告页面
pub mod live_report_screen;

/// 产量汇总页面
pub mod production_screen;

/// 报告格式化（HTML / CSV）
pub mod report_formatter;

/// 报告下载服务
pub mod report_generation_service;

pub use session::{Session, SessionGate};
pub use poller::{GenerationHandle, PollTicket, Poller, PollerConfig};
pub use screen_state::{ScreenSnapshot, ScreenState};
pub use monitored_screen::{CycleOutcome, MonitoredScreen, ScreenSource};
pub use dashboard_screen::{DashboardScreen, DashboardSource, DashboardView, GroupCard, MachineCard, ShiftCard};
pub use live_report_screen::{LiveReportScreen, LiveReportSource, LiveReportView, ReportSelection, ShiftReport, SlotRow};
pub use production_screen::{ProductionScreen, ProductionSource, ProductionView};
pub use report_formatter::{render_csv, render_html, to_csv, to_html};
pub use report_generation_service::{ReportDownloadService, ReportRequest};

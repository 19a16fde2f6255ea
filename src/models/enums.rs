use serde::{Deserialize, Serialize};
use std::fmt;

/// 报告类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    /// 单台机器按班次、按时段的明细报告
    ShiftWise,
    /// 按组汇总各机器各班次产量的报告
    Summary,
}

impl ReportKind {
    /// 表头，HTML 与 CSV 共用同一列顺序
    pub fn columns(&self) -> [&'static str; 6] {
        match self {
            ReportKind::ShiftWise => ["Machine", "Shift", "Time Slot", "Production", "Target", "Difference"],
            ReportKind::Summary => ["Group", "Shift", "Machine", "Production", "Target", "Difference"],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::ShiftWise => "Shift Wise Production Report",
            ReportKind::Summary => "Production Summary Report",
        }
    }

    /// 文件名片段
    pub fn file_stem(&self) -> &'static str {
        match self {
            ReportKind::ShiftWise => "shift_wise_report",
            ReportKind::Summary => "production_summary",
        }
    }
}

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Pdf => write!(f, "PDF"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

/// 报告下载状态机
///
/// `Idle → Fetching → Formatting → Exporting(fmt) → Idle`，
/// 任一步骤失败进入 `Error`，随后回到 `Idle`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    Idle,
    Fetching,
    Formatting,
    Exporting(ExportFormat),
    Error(String),
}

impl DownloadState {
    /// 界面加载标志
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            DownloadState::Fetching | DownloadState::Formatting | DownloadState::Exporting(_)
        )
    }
}

impl Default for DownloadState {
    fn default() -> Self {
        DownloadState::Idle
    }
}

/// 生产效率色带（实际产量 / 目标产量）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EfficiencyBand {
    /// 低于 85%
    Low,
    /// 85% 至 95%（含 85%）
    Medium,
    /// 95% 及以上
    High,
}

impl EfficiencyBand {
    /// 卡片背景色
    pub fn background_color(&self) -> &'static str {
        match self {
            EfficiencyBand::Low => "#F8D7DA",
            EfficiencyBand::Medium => "#FFF3CD",
            EfficiencyBand::High => "#D4EDDA",
        }
    }
}

/// 导航目标页面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Screen {
    Login,
    TabScreen,
    Dashboard,
    LiveReport,
    Production,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::Login => "Login",
            Screen::TabScreen => "TabScreen",
            Screen::Dashboard => "Dashboard",
            Screen::LiveReport => "LiveReport",
            Screen::Production => "Production",
        };
        write!(f, "{}", name)
    }
}

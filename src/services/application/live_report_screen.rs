/// 实时报告页面
///
/// 展示单台机器当日各班次、各时段的产量，每 20 秒刷新

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::models::{EfficiencyBand, MachineReport, Screen, ShiftTotals};
use crate::services::application::monitored_screen::{MonitoredScreen, ScreenSource};
use crate::services::application::poller::PollerConfig;
use crate::services::application::session::SessionGate;
use crate::services::domain::efficiency::efficiency_band;
use crate::services::domain::shift_aggregator::{aggregate_shift, latest_shift_label};
use crate::services::domain::time_slot_normalizer::retain_active_shifts;
use crate::services::infrastructure::{INavigator, IProductionApi, IUserNotifier};
use crate::utils::error::{AppError, AppResult};
use crate::utils::time_utils::ShiftWindow;

/// 时段行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRow {
    pub label: String,
    pub production: u64,
    pub target: u64,
    pub difference: i64,
    pub band: Option<EfficiencyBand>,
}

/// 班次明细
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftReport {
    pub shift_no: u32,
    pub label: String,
    pub window: Option<ShiftWindow>,
    pub rows: Vec<SlotRow>,
    pub totals: ShiftTotals,
}

/// 实时报告视图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveReportView {
    pub machine_id: String,
    pub machine_name: String,
    pub date: Option<String>,
    pub latest_shift_label: String,
    pub shifts: Vec<ShiftReport>,
    pub totals: ShiftTotals,
}

impl LiveReportView {
    pub fn from_report(report: &MachineReport) -> Self {
        let active = retain_active_shifts(report.shifts.clone());
        let shifts: Vec<ShiftReport> = active
            .iter()
            .map(|shift| ShiftReport {
                shift_no: shift.shift_no,
                label: shift.label(),
                window: shift.window(),
                rows: shift
                    .slots
                    .iter()
                    .map(|slot| SlotRow {
                        label: slot.label(),
                        production: slot.production_count,
                        target: slot.target_count,
                        difference: slot.difference(),
                        band: efficiency_band(slot.production_count, slot.target_count),
                    })
                    .collect(),
                totals: aggregate_shift(shift),
            })
            .collect();

        Self {
            machine_id: report.machine_id.clone(),
            machine_name: report.machine_name.clone(),
            date: report.date.clone(),
            latest_shift_label: latest_shift_label(&active),
            totals: shifts.iter().map(|s| s.totals).sum(),
            shifts,
        }
    }
}

/// 当前选择的机器与日期
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSelection {
    pub machine_id: String,
    pub date: String,
}

/// 实时报告数据源（小时报告接口）
pub struct LiveReportSource {
    api: Arc<dyn IProductionApi>,
    selection: RwLock<ReportSelection>,
}

impl LiveReportSource {
    pub fn new(api: Arc<dyn IProductionApi>, selection: ReportSelection) -> Self {
        Self { api, selection: RwLock::new(selection) }
    }

    pub fn selection(&self) -> AppResult<ReportSelection> {
        self.selection
            .read()
            .map(|s| s.clone())
            .map_err(|_| AppError::generic("读取报告选择失败"))
    }

    fn select(&self, selection: ReportSelection) -> AppResult<()> {
        let mut current = self
            .selection
            .write()
            .map_err(|_| AppError::generic("更新报告选择失败"))?;
        *current = selection;
        Ok(())
    }
}

#[async_trait]
impl ScreenSource for LiveReportSource {
    type View = LiveReportView;

    fn screen(&self) -> Screen {
        Screen::LiveReport
    }

    async fn load(&self, token: &str) -> AppResult<LiveReportView> {
        let selection = self.selection()?;
        let report = self
            .api
            .fetch_hourly_report(token, &selection.machine_id, &selection.date)
            .await?;
        Ok(LiveReportView::from_report(&report))
    }
}

/// 实时报告页面
pub struct LiveReportScreen {
    inner: MonitoredScreen<LiveReportSource>,
}

impl LiveReportScreen {
    pub fn new(
        api: Arc<dyn IProductionApi>,
        selection: ReportSelection,
        gate: Arc<SessionGate>,
        navigator: Arc<dyn INavigator>,
        notifier: Arc<dyn IUserNotifier>,
        config: PollerConfig,
    ) -> Self {
        let source = Arc::new(LiveReportSource::new(api, selection));
        Self { inner: MonitoredScreen::new(source, gate, navigator, notifier, config) }
    }

    pub fn screen(&self) -> &MonitoredScreen<LiveReportSource> {
        &self.inner
    }

    pub fn screen_mut(&mut self) -> &mut MonitoredScreen<LiveReportSource> {
        &mut self.inner
    }

    /// 切换机器或日期；轮询中时重新开始周期，旧周期的结果不会写回
    pub fn select(&mut self, selection: ReportSelection) -> AppResult<()> {
        self.inner.source().select(selection)?;
        if self.inner.is_polling() {
            self.inner.on_focus();
        }
        Ok(())
    }
}

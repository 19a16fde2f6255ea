/// 看板页面
///
/// 按组展示每台机器的当日产量、最新班次与效率色带。
/// 数据来自轮询，推送通道连接期间改由推送快照更新并暂停轮询。

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::models::{EfficiencyBand, Group, Machine, Screen, Shift, ShiftTotals};
use crate::services::application::monitored_screen::{MonitoredScreen, ScreenSource};
use crate::services::application::poller::PollerConfig;
use crate::services::application::session::SessionGate;
use crate::services::domain::efficiency::efficiency_band;
use crate::services::domain::shift_aggregator::{aggregate_shift, latest_shift, NO_SHIFT_LABEL};
use crate::services::infrastructure::{ILiveUpdateSource, INavigator, IProductionApi, IUserNotifier, LiveEvent};
use crate::utils::error::AppResult;
use crate::utils::time_utils::ShiftWindow;

/// 班次卡片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftCard {
    pub shift_no: u32,
    pub label: String,
    pub window: Option<ShiftWindow>,
    pub totals: ShiftTotals,
    pub band: Option<EfficiencyBand>,
}

impl ShiftCard {
    fn from_shift(shift: &Shift) -> Self {
        let totals = aggregate_shift(shift);
        Self {
            shift_no: shift.shift_no,
            label: shift.label(),
            window: shift.window(),
            totals,
            band: efficiency_band(totals.total_production, totals.total_target),
        }
    }
}

/// 机器卡片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineCard {
    pub machine_id: String,
    pub machine_name: String,
    pub production_count: u64,
    pub target_production: u64,
    pub band: Option<EfficiencyBand>,
    pub latest_shift: Option<ShiftCard>,
    /// 只包含有时段数据的班次
    pub shifts: Vec<ShiftCard>,
}

impl MachineCard {
    fn from_machine(machine: &Machine) -> Self {
        Self {
            machine_id: machine.machine_id.clone(),
            machine_name: machine.machine_name.clone(),
            production_count: machine.production_count,
            target_production: machine.target_production,
            band: efficiency_band(machine.production_count, machine.target_production),
            latest_shift: latest_shift(&machine.shifts).map(ShiftCard::from_shift),
            shifts: machine
                .shifts
                .iter()
                .filter(|s| s.has_timing())
                .map(ShiftCard::from_shift)
                .collect(),
        }
    }

    /// 最新班次名称，没有时为 `No shift available`
    pub fn latest_shift_label(&self) -> &str {
        self.latest_shift.as_ref().map_or(NO_SHIFT_LABEL, |s| s.label.as_str())
    }
}

/// 组卡片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCard {
    pub group_id: String,
    pub group_name: String,
    pub machines: Vec<MachineCard>,
    pub production_count: u64,
    pub target_production: u64,
}

/// 看板视图
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    pub groups: Vec<GroupCard>,
}

impl DashboardView {
    /// 没有机器的组不展示
    pub fn from_groups(groups: &[Group]) -> Self {
        let groups = groups
            .iter()
            .filter(|g| !g.machines.is_empty())
            .map(|group| GroupCard {
                group_id: group.group_id.clone(),
                group_name: group.group_name.clone(),
                machines: group.machines.iter().map(MachineCard::from_machine).collect(),
                production_count: group.machines.iter().fold(0u64, |acc, m| acc.saturating_add(m.production_count)),
                target_production: group.machines.iter().fold(0u64, |acc, m| acc.saturating_add(m.target_production)),
            })
            .collect();
        Self { groups }
    }

    pub fn machine_count(&self) -> usize {
        self.groups.iter().map(|g| g.machines.len()).sum()
    }
}

/// 看板数据源
pub struct DashboardSource {
    api: Arc<dyn IProductionApi>,
}

impl DashboardSource {
    pub fn new(api: Arc<dyn IProductionApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ScreenSource for DashboardSource {
    type View = DashboardView;

    fn screen(&self) -> Screen {
        Screen::Dashboard
    }

    async fn load(&self, token: &str) -> AppResult<DashboardView> {
        let groups = self.api.fetch_dashboard(token).await?;
        Ok(DashboardView::from_groups(&groups))
    }
}

/// 看板页面
pub struct DashboardScreen {
    inner: MonitoredScreen<DashboardSource>,
    gate: Arc<SessionGate>,
}

impl DashboardScreen {
    pub fn new(
        api: Arc<dyn IProductionApi>,
        gate: Arc<SessionGate>,
        navigator: Arc<dyn INavigator>,
        notifier: Arc<dyn IUserNotifier>,
        config: PollerConfig,
    ) -> Self {
        let source = Arc::new(DashboardSource::new(api));
        Self {
            inner: MonitoredScreen::new(source, gate.clone(), navigator, notifier, config),
            gate,
        }
    }

    pub fn screen(&self) -> &MonitoredScreen<DashboardSource> {
        &self.inner
    }

    pub fn screen_mut(&mut self) -> &mut MonitoredScreen<DashboardSource> {
        &mut self.inner
    }

    /// 跟随推送通道，直到通道断开或取消
    ///
    /// 连接期间暂停轮询，快照直接替换页面数据；断开后恢复轮询
    pub async fn follow_live(&mut self, live: &dyn ILiveUpdateSource, cancel: CancellationToken) -> AppResult<()> {
        let token = self.gate.authorize().await?;
        let mut events = live.subscribe(&token, cancel.child_token());

        while let Some(event) = events.recv().await {
            match event {
                LiveEvent::Connected => {
                    info!("[Dashboard] 推送已连接，暂停轮询");
                    self.inner.on_blur();
                }
                LiveEvent::Snapshot(groups) => {
                    self.inner.state().replace(DashboardView::from_groups(&groups));
                }
                LiveEvent::Disconnected => break,
            }
        }

        if !cancel.is_cancelled() {
            info!("[Dashboard] 推送已断开，恢复轮询");
            self.inner.on_focus();
        }
        Ok(())
    }
}

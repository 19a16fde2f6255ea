/// 产量汇总页面
///
/// 按日期展示各组、各机器、各班次的产量汇总，3 秒轮询；
/// 切换日期通过防抖触发，连续切换只产生一次拉取。

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::models::{Group, Screen, ShiftTotals};
use crate::services::application::monitored_screen::{MonitoredScreen, ScreenSource};
use crate::services::application::poller::PollerConfig;
use crate::services::application::session::SessionGate;
use crate::services::domain::shift_aggregator::{aggregate_group, shift_headers, GroupSummary};
use crate::services::infrastructure::{INavigator, IProductionApi, IUserNotifier};
use crate::utils::error::{AppError, AppResult};

/// 产量汇总视图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionView {
    pub date: String,
    pub shift_headers: Vec<String>,
    pub groups: Vec<GroupSummary>,
    pub grand_total: ShiftTotals,
}

impl ProductionView {
    pub fn from_groups(date: impl Into<String>, groups: &[Group]) -> Self {
        let headers = shift_headers(groups);
        let summaries: Vec<GroupSummary> = groups.iter().map(|g| aggregate_group(g, &headers)).collect();
        Self {
            date: date.into(),
            grand_total: summaries.iter().map(|g| g.grand_total).sum(),
            shift_headers: headers,
            groups: summaries,
        }
    }
}

/// 产量汇总数据源
pub struct ProductionSource {
    api: Arc<dyn IProductionApi>,
    date: RwLock<String>,
}

impl ProductionSource {
    pub fn new(api: Arc<dyn IProductionApi>, date: impl Into<String>) -> Self {
        Self { api, date: RwLock::new(date.into()) }
    }

    pub fn date(&self) -> AppResult<String> {
        self.date
            .read()
            .map(|d| d.clone())
            .map_err(|_| AppError::generic("读取日期失败"))
    }

    fn set_date(&self, date: String) -> AppResult<()> {
        let mut current = self.date.write().map_err(|_| AppError::generic("更新日期失败"))?;
        *current = date;
        Ok(())
    }
}

#[async_trait]
impl ScreenSource for ProductionSource {
    type View = ProductionView;

    fn screen(&self) -> Screen {
        Screen::Production
    }

    async fn load(&self, token: &str) -> AppResult<ProductionView> {
        let date = self.date()?;
        let groups = self.api.fetch_production(token, &date).await?;
        Ok(ProductionView::from_groups(date, &groups))
    }
}

/// 产量汇总页面
pub struct ProductionScreen {
    inner: MonitoredScreen<ProductionSource>,
}

impl ProductionScreen {
    pub fn new(
        api: Arc<dyn IProductionApi>,
        date: impl Into<String>,
        gate: Arc<SessionGate>,
        navigator: Arc<dyn INavigator>,
        notifier: Arc<dyn IUserNotifier>,
        config: PollerConfig,
    ) -> Self {
        let source = Arc::new(ProductionSource::new(api, date));
        Self { inner: MonitoredScreen::new(source, gate, navigator, notifier, config) }
    }

    pub fn screen(&self) -> &MonitoredScreen<ProductionSource> {
        &self.inner
    }

    pub fn screen_mut(&mut self) -> &mut MonitoredScreen<ProductionSource> {
        &mut self.inner
    }

    /// 切换日期并请求防抖拉取，旧日期的进行中拉取不再写回
    pub fn set_date(&self, date: impl Into<String>) -> AppResult<bool> {
        self.inner.source().set_date(date.into())?;
        Ok(self.inner.requery())
    }
}

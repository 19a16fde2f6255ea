/// 受监控页面
///
/// 把会话守卫、数据源、页面状态和轮询器组合成一个页面的完整轮询周期：
/// 会话校验 → 拉取 → 写回状态。看板、实时报告、产量汇总三个页面共用这一流程。

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

use crate::models::Screen;
use crate::services::application::poller::{PollTicket, Poller, PollerConfig};
use crate::services::application::screen_state::ScreenState;
use crate::services::application::session::SessionGate;
use crate::services::infrastructure::{INavigator, IUserNotifier};
use crate::utils::error::{AppError, AppResult};
use crate::{log_data_shape_failure, log_network_failure};

/// 拉取失败时的提示
pub const FETCH_ALERT_TITLE: &str = "Error";
pub const FETCH_ALERT_MESSAGE: &str = "Failed to fetch data. Please try again.";

/// 页面数据源
#[async_trait]
pub trait ScreenSource: Send + Sync + 'static {
    type View: Clone + Send + Sync + 'static;

    fn screen(&self) -> Screen;

    /// 使用已校验的令牌拉取并整理页面数据
    async fn load(&self, token: &str) -> AppResult<Self::View>;
}

/// 一个轮询周期的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 数据已写回
    Applied,
    /// 周期已过期，结果被丢弃
    Stale,
    /// 响应结构异常，页面重置为空状态
    Emptied,
    /// 会话无效
    AuthRequired,
    /// 网络不可用
    Offline,
    /// 其他失败，保留之前的数据
    Failed(String),
}

/// 单个周期需要的全部协作者
struct CycleContext<S: ScreenSource> {
    source: Arc<S>,
    gate: Arc<SessionGate>,
    navigator: Arc<dyn INavigator>,
    notifier: Arc<dyn IUserNotifier>,
    state: Arc<ScreenState<S::View>>,
}

impl<S: ScreenSource> CycleContext<S> {
    async fn run(&self, ticket: PollTicket) -> CycleOutcome {
        let screen = self.source.screen();

        // 会话校验必须在拉取之前完成
        let token = match self.gate.ensure_session(self.navigator.as_ref()).await {
            Ok(token) => token,
            Err(e) if e.is_network_unavailable() => return CycleOutcome::Offline,
            Err(e) => {
                debug!("[{}] 会话无效: {}", screen, e);
                return CycleOutcome::AuthRequired;
            }
        };

        match self.source.load(&token).await {
            Ok(view) => {
                if self.state.apply(ticket, view) {
                    CycleOutcome::Applied
                } else {
                    CycleOutcome::Stale
                }
            }
            Err(e @ AppError::DataShapeUnexpected { .. }) => {
                log_data_shape_failure!("[{}] {}", screen, e);
                self.state.reset(ticket);
                CycleOutcome::Emptied
            }
            Err(e) if e.is_auth_invalid() => {
                warn!("[{}] 拉取时令牌被拒绝: {}", screen, e);
                self.navigator.navigate(Screen::Login, None);
                CycleOutcome::AuthRequired
            }
            Err(e) => {
                log_network_failure!("[{}] 拉取失败: {}", screen, e);
                self.notifier.alert(FETCH_ALERT_TITLE, FETCH_ALERT_MESSAGE);
                CycleOutcome::Failed(e.to_string())
            }
        }
    }
}

/// 受监控页面
pub struct MonitoredScreen<S: ScreenSource> {
    context: Arc<CycleContext<S>>,
    poller: Poller,
}

impl<S: ScreenSource> MonitoredScreen<S> {
    pub fn new(
        source: Arc<S>,
        gate: Arc<SessionGate>,
        navigator: Arc<dyn INavigator>,
        notifier: Arc<dyn IUserNotifier>,
        config: PollerConfig,
    ) -> Self {
        let poller = Poller::new(source.screen().to_string(), config);
        let state = Arc::new(ScreenState::new(poller.generation()));
        Self {
            context: Arc::new(CycleContext { source, gate, navigator, notifier, state }),
            poller,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.context.source
    }

    pub fn state(&self) -> &Arc<ScreenState<S::View>> {
        &self.context.state
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// 页面获得焦点：立即拉取并开始轮询
    pub fn on_focus(&mut self) {
        let context = self.context.clone();
        self.poller.start(move |ticket| {
            let context = context.clone();
            async move {
                let outcome = context.run(ticket).await;
                debug!("[{}] 轮询结果: {:?}", context.source.screen(), outcome);
            }
        });
    }

    /// 页面失去焦点或卸载：停止轮询并中止进行中的拉取
    pub fn on_blur(&mut self) {
        self.poller.stop();
    }

    /// 请求一次额外拉取（按防抖配置合并）
    pub fn refresh(&self) -> bool {
        self.poller.trigger()
    }

    /// 查询条件已变化：作废进行中的拉取，再请求一次拉取（按防抖配置合并）
    pub fn requery(&self) -> bool {
        self.poller.discard_issued();
        self.poller.trigger()
    }

    /// 不启动轮询，只执行一个周期
    pub async fn refresh_once(&self) -> CycleOutcome {
        let ticket = self.poller.issue_ticket();
        self.context.run(ticket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoginResponse;
    use crate::services::application::session::Session;
    use crate::services::infrastructure::{
        MemoryTokenStore, MockINavigator, MockINetworkMonitor, MockIProductionApi, MockIUserNotifier,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 按顺序返回预设结果的数据源
    struct ScriptedSource {
        results: Mutex<Vec<AppResult<u32>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(results: Vec<AppResult<u32>>) -> Self {
            Self { results: Mutex::new(results), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ScreenSource for ScriptedSource {
        type View = u32;

        fn screen(&self) -> Screen {
            Screen::Dashboard
        }

        async fn load(&self, token: &str) -> AppResult<u32> {
            assert_eq!(token, "abc");
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            if results.is_empty() { Ok(0) } else { results.remove(0) }
        }
    }

    async fn gate(token_valid: bool, connected: bool) -> Arc<SessionGate> {
        let session = Arc::new(Session::new(Arc::new(MemoryTokenStore::new())));
        session
            .login(&LoginResponse { token: "abc".into(), user_name: None, role: None })
            .await
            .unwrap();
        let mut api = MockIProductionApi::new();
        api.expect_check_token().returning(move |_| {
            if token_valid { Ok(()) } else { Err(AppError::auth_invalid("401")) }
        });
        let mut network = MockINetworkMonitor::new();
        network.expect_is_connected().returning(move || connected);
        let mut notifier = MockIUserNotifier::new();
        notifier.expect_alert().return_const(());
        Arc::new(SessionGate::new(session, Arc::new(api), Arc::new(network), Arc::new(notifier)))
    }

    fn screen(
        source: Arc<ScriptedSource>,
        gate: Arc<SessionGate>,
        navigator: MockINavigator,
        notifier: MockIUserNotifier,
    ) -> MonitoredScreen<ScriptedSource> {
        MonitoredScreen::new(
            source,
            gate,
            Arc::new(navigator),
            Arc::new(notifier),
            PollerConfig::fixed(Duration::from_secs(20)),
        )
    }

    fn silent_navigator() -> MockINavigator {
        let mut navigator = MockINavigator::new();
        navigator.expect_navigate().never();
        navigator
    }

    fn silent_notifier() -> MockIUserNotifier {
        let mut notifier = MockIUserNotifier::new();
        notifier.expect_alert().never();
        notifier
    }

    #[tokio::test]
    async fn test_successful_cycle_applies_view() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(42)]));
        let screen = screen(source, gate(true, true).await, silent_navigator(), silent_notifier());
        assert_eq!(screen.refresh_once().await, CycleOutcome::Applied);
        assert_eq!(screen.state().view(), Some(42));
    }

    #[tokio::test]
    async fn test_data_shape_error_resets_to_empty() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(5),
            Err(AppError::data_shape_unexpected("dashboard", "缺少 groups 数组")),
        ]));
        let screen = screen(source, gate(true, true).await, silent_navigator(), silent_notifier());
        screen.refresh_once().await;
        assert_eq!(screen.refresh_once().await, CycleOutcome::Emptied);
        assert_eq!(screen.state().view(), None);
    }

    #[tokio::test]
    async fn test_network_error_keeps_previous_view_and_alerts() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(5), Err(AppError::network_error("timeout"))]));
        let mut notifier = MockIUserNotifier::new();
        notifier
            .expect_alert()
            .withf(|title, _| title == FETCH_ALERT_TITLE)
            .times(1)
            .return_const(());
        let screen = screen(source, gate(true, true).await, silent_navigator(), notifier);
        screen.refresh_once().await;
        assert!(matches!(screen.refresh_once().await, CycleOutcome::Failed(_)));
        assert_eq!(screen.state().view(), Some(5));
    }

    #[tokio::test]
    async fn test_invalid_session_never_fetches() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(1)]));
        let mut navigator = MockINavigator::new();
        navigator.expect_navigate().times(1).return_const(());
        let screen = screen(source.clone(), gate(false, true).await, navigator, silent_notifier());

        assert_eq!(screen.refresh_once().await, CycleOutcome::AuthRequired);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_cycle_does_not_redirect() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(1)]));
        let screen = screen(source.clone(), gate(true, false).await, silent_navigator(), silent_notifier());
        assert_eq!(screen.refresh_once().await, CycleOutcome::Offline);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_polls_until_blur() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let mut screen = screen(source.clone(), gate(true, true).await, silent_navigator(), silent_notifier());

        screen.on_focus();
        assert!(screen.is_polling());
        tokio::time::sleep(Duration::from_millis(40_500)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        screen.on_blur();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(!screen.is_polling());
    }
}

/// 会话与会话守卫
///
/// `Session` 是显式的会话对象（令牌 + 用户信息），注入到每个需要拉取数据的组件中。
/// `SessionGate` 在每次拉取之前校验令牌，保证数据请求只在令牌有效时发出。

use log::{debug, info, warn};
use std::sync::Arc;

use crate::models::{LoginResponse, Screen, UserProfile};
use crate::services::infrastructure::{IProductionApi, INavigator, INetworkMonitor, ITokenStore, IUserNotifier};
use crate::utils::error::{AppError, AppResult};
use crate::{log_network_failure, log_user_operation};

/// 令牌在存储中的键
pub const TOKEN_KEY: &str = "token";
pub const USER_NAME_KEY: &str = "user_name";
pub const ROLE_KEY: &str = "role";

/// 离线提示
pub const OFFLINE_ALERT_TITLE: &str = "No Internet Connection";
pub const OFFLINE_ALERT_MESSAGE: &str = "Please check your internet connection and try again.";

/// 会话对象
pub struct Session {
    store: Arc<dyn ITokenStore>,
}

impl Session {
    pub fn new(store: Arc<dyn ITokenStore>) -> Self {
        Self { store }
    }

    /// 当前令牌，空字符串视为没有令牌
    pub async fn token(&self) -> AppResult<Option<String>> {
        Ok(self
            .store
            .get(TOKEN_KEY)
            .await?
            .filter(|t| !t.trim().is_empty()))
    }

    pub async fn profile(&self) -> AppResult<UserProfile> {
        Ok(UserProfile {
            user_name: self.store.get(USER_NAME_KEY).await?,
            role: self.store.get(ROLE_KEY).await?,
        })
    }

    /// 保存登录结果
    pub async fn login(&self, response: &LoginResponse) -> AppResult<UserProfile> {
        self.store.set(TOKEN_KEY, &response.token).await?;
        for (key, value) in [(USER_NAME_KEY, &response.user_name), (ROLE_KEY, &response.role)] {
            match value {
                Some(value) => self.store.set(key, value).await?,
                None => self.store.remove(key).await?,
            }
        }
        Ok(UserProfile { user_name: response.user_name.clone(), role: response.role.clone() })
    }

    /// 清除令牌与用户信息
    pub async fn logout(&self) -> AppResult<()> {
        for key in [TOKEN_KEY, USER_NAME_KEY, ROLE_KEY] {
            self.store.remove(key).await?;
        }
        Ok(())
    }
}

/// 会话守卫
pub struct SessionGate {
    session: Arc<Session>,
    api: Arc<dyn IProductionApi>,
    network: Arc<dyn INetworkMonitor>,
    notifier: Arc<dyn IUserNotifier>,
}

impl SessionGate {
    pub fn new(
        session: Arc<Session>,
        api: Arc<dyn IProductionApi>,
        network: Arc<dyn INetworkMonitor>,
        notifier: Arc<dyn IUserNotifier>,
    ) -> Self {
        Self { session, api, network, notifier }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// 校验令牌并返回本次拉取可用的令牌
    ///
    /// 先检查网络：离线时提示用户并返回 `NetworkUnavailable`，不读取也不清除令牌
    pub async fn authorize(&self) -> AppResult<String> {
        if !self.network.is_connected().await {
            self.notifier.alert(OFFLINE_ALERT_TITLE, OFFLINE_ALERT_MESSAGE);
            return Err(AppError::network_unavailable("当前没有网络连接"));
        }

        let token = self
            .session
            .token()
            .await?
            .ok_or_else(|| AppError::auth_invalid("未找到登录令牌"))?;

        match self.api.check_token(&token).await {
            Ok(()) => {
                debug!("[SessionGate] 令牌有效");
                Ok(token)
            }
            Err(e) => {
                warn!("[SessionGate] 令牌校验失败: {}", e);
                if e.is_auth_invalid() {
                    Err(e)
                } else {
                    Err(AppError::auth_invalid(format!("令牌校验请求失败: {}", e)))
                }
            }
        }
    }

    /// 令牌是否有效
    pub async fn check_token(&self) -> bool {
        self.authorize().await.is_ok()
    }

    /// 校验失败时再次确认网络，只有网络可用才跳转登录页
    pub async fn ensure_session(&self, navigator: &dyn INavigator) -> AppResult<String> {
        match self.authorize().await {
            Ok(token) => Ok(token),
            Err(e) => {
                if self.network.is_connected().await {
                    info!("[SessionGate] 会话无效，跳转登录页");
                    navigator.navigate(Screen::Login, None);
                } else {
                    log_network_failure!("会话校验失败且网络不可用，保持当前页面: {}", e);
                }
                Err(e)
            }
        }
    }

    /// 登录并保存会话
    pub async fn login(&self, user_name: &str, password: &str) -> AppResult<UserProfile> {
        if !self.network.is_connected().await {
            self.notifier.alert(OFFLINE_ALERT_TITLE, OFFLINE_ALERT_MESSAGE);
            return Err(AppError::network_unavailable("当前没有网络连接"));
        }
        let response = self.api.login(user_name, password).await?;
        let profile = self.session.login(&response).await?;
        log_user_operation!("用户登录: {}", profile.user_name.as_deref().unwrap_or(user_name));
        Ok(profile)
    }

    pub async fn logout(&self) -> AppResult<()> {
        self.session.logout().await?;
        log_user_operation!("用户登出");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::infrastructure::{
        MemoryTokenStore, MockINavigator, MockINetworkMonitor, MockIProductionApi, MockITokenStore,
        MockIUserNotifier,
    };
    use mockall::predicate;

    fn online(times: usize) -> MockINetworkMonitor {
        let mut network = MockINetworkMonitor::new();
        network.expect_is_connected().times(times).returning(|| true);
        network
    }

    fn offline() -> MockINetworkMonitor {
        let mut network = MockINetworkMonitor::new();
        network.expect_is_connected().returning(|| false);
        network
    }

    async fn session_with_token(token: Option<&str>) -> Arc<Session> {
        let session = Arc::new(Session::new(Arc::new(MemoryTokenStore::new())));
        if let Some(token) = token {
            session
                .login(&LoginResponse { token: token.into(), user_name: Some("op1".into()), role: None })
                .await
                .unwrap();
        }
        session
    }

    fn quiet_notifier() -> MockIUserNotifier {
        let mut notifier = MockIUserNotifier::new();
        notifier.expect_alert().never();
        notifier
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token()
            .withf(|token| token == "abc")
            .times(1)
            .returning(|_| Ok(()));

        let gate = SessionGate::new(
            session_with_token(Some("abc")).await,
            Arc::new(api),
            Arc::new(online(1)),
            Arc::new(quiet_notifier()),
        );
        assert!(gate.check_token().await);
    }

    #[tokio::test]
    async fn test_offline_alerts_and_keeps_token() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().never();
        let mut notifier = MockIUserNotifier::new();
        notifier
            .expect_alert()
            .withf(|title, _| title == OFFLINE_ALERT_TITLE)
            .times(1)
            .return_const(());

        let session = session_with_token(Some("abc")).await;
        let gate = SessionGate::new(session.clone(), Arc::new(api), Arc::new(offline()), Arc::new(notifier));

        let err = gate.authorize().await.unwrap_err();
        assert!(err.is_network_unavailable());
        assert_eq!(session.token().await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().never();
        let gate = SessionGate::new(
            session_with_token(None).await,
            Arc::new(api),
            Arc::new(online(1)),
            Arc::new(quiet_notifier()),
        );
        assert!(!gate.check_token().await);
    }

    #[tokio::test]
    async fn test_rejected_token_redirects_when_online() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().returning(|_| Err(AppError::auth_invalid("401")));
        let mut navigator = MockINavigator::new();
        navigator
            .expect_navigate()
            .with(predicate::eq(Screen::Login), predicate::eq(None))
            .times(1)
            .return_const(());

        let gate = SessionGate::new(
            session_with_token(Some("stale")).await,
            Arc::new(api),
            Arc::new(online(2)),
            Arc::new(quiet_notifier()),
        );
        let err = gate.ensure_session(&navigator).await.unwrap_err();
        assert!(err.is_auth_invalid());
    }

    #[tokio::test]
    async fn test_no_redirect_during_outage() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().never();
        let mut navigator = MockINavigator::new();
        navigator.expect_navigate().never();
        let mut notifier = MockIUserNotifier::new();
        notifier.expect_alert().times(1).return_const(());

        let gate = SessionGate::new(
            session_with_token(Some("abc")).await,
            Arc::new(api),
            Arc::new(offline()),
            Arc::new(notifier),
        );
        assert!(gate.ensure_session(&navigator).await.is_err());
    }

    #[tokio::test]
    async fn test_server_error_on_token_check_counts_as_invalid() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().returning(|_| Err(AppError::network_error("HTTP 500")));
        let gate = SessionGate::new(
            session_with_token(Some("abc")).await,
            Arc::new(api),
            Arc::new(online(1)),
            Arc::new(quiet_notifier()),
        );
        assert!(gate.authorize().await.unwrap_err().is_auth_invalid());
    }

    #[tokio::test]
    async fn test_login_and_logout_round_trip() {
        let mut api = MockIProductionApi::new();
        api.expect_login()
            .withf(|user, password| user == "op1" && password == "secret")
            .times(1)
            .returning(|_, _| {
                Ok(LoginResponse { token: "fresh".into(), user_name: Some("Operator".into()), role: Some("viewer".into()) })
            });

        let session = session_with_token(None).await;
        let gate = SessionGate::new(session.clone(), Arc::new(api), Arc::new(online(1)), Arc::new(quiet_notifier()));

        let profile = gate.login("op1", "secret").await.unwrap();
        assert_eq!(profile.role.as_deref(), Some("viewer"));
        assert_eq!(session.token().await.unwrap().as_deref(), Some("fresh"));

        gate.logout().await.unwrap();
        assert_eq!(session.token().await.unwrap(), None);
        assert_eq!(session.profile().await.unwrap(), UserProfile::default());
    }

    #[tokio::test]
    async fn test_blank_token_counts_as_missing() {
        let mut store = MockITokenStore::new();
        store
            .expect_get()
            .withf(|key| key == TOKEN_KEY)
            .returning(|_| Ok(Some("   ".to_string())));
        let session = Session::new(Arc::new(store));
        assert_eq!(session.token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_treated_as_logged_out() {
        let mut store = MockITokenStore::new();
        store
            .expect_get()
            .returning(|_| Err(AppError::json_error("会话文件损坏")));
        let session = Session::new(Arc::new(store));
        assert_eq!(session.token().await.unwrap_err().error_code(), "JSON_ERROR");
    }
}

/// 界面协作接口
///
/// 核心逻辑只需要"跳转到某个页面"和"提示用户"两种能力

use log::{info, warn};
use serde_json::Value;
use std::sync::Mutex;

use crate::models::Screen;

/// 页面导航
#[cfg_attr(test, mockall::automock)]
pub trait INavigator: Send + Sync {
    fn navigate(&self, screen: Screen, params: Option<Value>);
}

/// 用户提示
#[cfg_attr(test, mockall::automock)]
pub trait IUserNotifier: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// 把提示写入日志，命令行模式使用
#[derive(Debug, Default)]
pub struct LogNotifier;

impl IUserNotifier for LogNotifier {
    fn alert(&self, title: &str, message: &str) {
        warn!("[提示] {}: {}", title, message);
    }
}

/// 记录导航请求，命令行模式下据此提示用户重新登录
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Screen>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Screen> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Screen> {
        self.history().last().copied()
    }
}

impl INavigator for RecordingNavigator {
    fn navigate(&self, screen: Screen, params: Option<Value>) {
        info!("[导航] 跳转到 {} 参数: {:?}", screen, params);
        if let Ok(mut history) = self.history.lock() {
            history.push(screen);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_navigator_keeps_order() {
        let navigator = RecordingNavigator::new();
        assert_eq!(navigator.last(), None);
        navigator.navigate(Screen::Login, None);
        navigator.navigate(Screen::TabScreen, Some(serde_json::json!({"tab": "Dashboard"})));
        assert_eq!(navigator.history(), vec![Screen::Login, Screen::TabScreen]);
        assert_eq!(navigator.last(), Some(Screen::TabScreen));
    }
}

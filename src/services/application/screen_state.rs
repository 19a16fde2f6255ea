/// 页面状态
///
/// 每个页面持有自己的一份数据，不在页面之间共享。
/// 轮询结果通过 `apply` 写回，过期凭据的结果会被丢弃。

use chrono::{DateTime, Local};
use log::debug;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::services::application::poller::{GenerationHandle, PollTicket};

/// 页面可观察的状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSnapshot<T> {
    /// `None` 表示空状态
    pub view: Option<T>,
    pub updated_at: Option<DateTime<Local>>,
}

impl<T> Default for ScreenSnapshot<T> {
    fn default() -> Self {
        Self { view: None, updated_at: None }
    }
}

/// 页面状态容器
pub struct ScreenState<T> {
    tx: watch::Sender<ScreenSnapshot<T>>,
    generation: GenerationHandle,
    last_applied: Mutex<Option<PollTicket>>,
}

impl<T: Clone + Send + Sync + 'static> ScreenState<T> {
    pub fn new(generation: GenerationHandle) -> Self {
        let (tx, _rx) = watch::channel(ScreenSnapshot::default());
        Self { tx, generation, last_applied: Mutex::new(None) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenSnapshot<T>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ScreenSnapshot<T> {
        self.tx.borrow().clone()
    }

    pub fn view(&self) -> Option<T> {
        self.tx.borrow().view.clone()
    }

    /// 写入一次拉取的结果；凭据已过期时返回 false 且不修改状态
    pub fn apply(&self, ticket: PollTicket, view: T) -> bool {
        self.commit(ticket, Some(view))
    }

    /// 响应结构异常时重置为空状态，同样受凭据保护
    pub fn reset(&self, ticket: PollTicket) -> bool {
        self.commit(ticket, None)
    }

    /// 推送数据不经过轮询，直接替换
    pub fn replace(&self, view: T) {
        self.tx.send_replace(ScreenSnapshot { view: Some(view), updated_at: Some(Local::now()) });
    }

    fn commit(&self, ticket: PollTicket, view: Option<T>) -> bool {
        // 代数检查与写入在同一把锁内完成，`Poller::stop` 返回后旧结果不会再落地
        let committed = self.generation.commit_if_current(ticket, || {
            let mut last = match self.last_applied.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(previous) = *last {
                if previous.generation == ticket.generation && previous.sequence > ticket.sequence {
                    debug!("[ScreenState] 丢弃比当前数据更旧的结果: {:?}", ticket);
                    return false;
                }
            }
            *last = Some(ticket);
            self.tx.send_replace(ScreenSnapshot { view, updated_at: Some(Local::now()) });
            true
        });
        committed.unwrap_or_else(|| {
            debug!("[ScreenState] 丢弃已取消周期的结果: {:?}", ticket);
            false
        })
    }
}

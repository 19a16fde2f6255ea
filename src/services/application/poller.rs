/// 轮询器
///
/// 页面获得焦点时启动：立即拉取一次，之后按固定间隔拉取；失去焦点时停止。
/// 每个轮询器同一时间只有一个定时任务，前一次拉取未结束时不会开始下一次。
///
/// 每次拉取都带有 `PollTicket`，停止 / 重新启动会推进代数，
/// 结果写回时据此丢弃已取消周期的过期数据。

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 单次拉取的凭据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollTicket {
    /// 轮询周期代数，每次启动 / 停止递增
    pub generation: u64,
    /// 同一轮询器内单调递增的请求序号
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct Epoch {
    generation: u64,
    /// 序号不大于此值的凭据一律作废
    floor: u64,
}

impl Epoch {
    fn accepts(&self, ticket: PollTicket) -> bool {
        ticket.generation == self.generation && ticket.sequence > self.floor
    }
}

/// 轮询器与页面状态共享的代数
///
/// 写回在持锁期间完成，停止轮询与写回互斥
#[derive(Debug, Clone, Default)]
pub struct GenerationHandle(Arc<Mutex<Epoch>>);

impl GenerationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Epoch> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_current(&self, ticket: PollTicket) -> bool {
        self.lock().accepts(ticket)
    }

    /// 凭据有效时在锁内执行 `commit`，否则返回 `None`
    pub fn commit_if_current<R>(&self, ticket: PollTicket, commit: impl FnOnce() -> R) -> Option<R> {
        let epoch = self.lock();
        if epoch.accepts(ticket) {
            Some(commit())
        } else {
            None
        }
    }

    fn advance(&self) -> u64 {
        let mut epoch = self.lock();
        epoch.generation += 1;
        epoch.generation
    }

    fn discard_through(&self, sequence: u64) {
        let mut epoch = self.lock();
        epoch.floor = epoch.floor.max(sequence);
    }
}

/// 轮询参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// 手动触发的防抖静默期；`None` 表示触发后立即拉取
    pub debounce: Option<Duration>,
}

impl PollerConfig {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval, debounce: None }
    }

    pub fn debounced(interval: Duration, debounce: Duration) -> Self {
        Self { interval, debounce: Some(debounce) }
    }
}

type FetchFn = Arc<dyn Fn(PollTicket) -> BoxFuture<'static, ()> + Send + Sync>;

struct ActiveCycle {
    cancel: CancellationToken,
    trigger_tx: mpsc::UnboundedSender<()>,
    handle: JoinHandle<()>,
}

/// 页面轮询器
pub struct Poller {
    name: String,
    config: PollerConfig,
    generation: GenerationHandle,
    sequence: Arc<AtomicU64>,
    active: Option<ActiveCycle>,
}

impl Poller {
    pub fn new(name: impl Into<String>, config: PollerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            generation: GenerationHandle::new(),
            sequence: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    pub fn generation(&self) -> GenerationHandle {
        self.generation.clone()
    }

    /// 为手动刷新签发凭据，与轮询共用序号
    pub fn issue_ticket(&self) -> PollTicket {
        PollTicket {
            generation: self.generation.current(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// 作废已签发的全部凭据，轮询周期继续运行
    ///
    /// 查询条件变化时调用，进行中的旧条件拉取不会再写回
    pub fn discard_issued(&self) {
        self.generation.discard_through(self.sequence.load(Ordering::SeqCst));
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().map_or(false, |a| !a.handle.is_finished())
    }

    /// 启动轮询
    ///
    /// 首次拉取在这里同步调用 `fetch`，之后每个间隔调用一次。
    /// 已在运行时先停止旧的周期，保证只有一个定时任务。
    pub fn start<F, Fut>(&mut self, fetch: F)
    where
        F: Fn(PollTicket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let fetch: FetchFn = Arc::new(move |ticket| fetch(ticket).boxed());
        let generation = self.generation.advance();
        let cancel = CancellationToken::new();
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let leading = fetch(self.issue_ticket());
        info!("[Poller] {} 启动，间隔 {:?}", self.name, self.config.interval);

        let handle = tokio::spawn(Self::run(
            self.name.clone(),
            self.config,
            generation,
            self.sequence.clone(),
            fetch,
            leading,
            trigger_rx,
            cancel.clone(),
        ));

        self.active = Some(ActiveCycle { cancel, trigger_tx, handle });
    }

    /// 停止轮询，进行中的拉取会被中止，其结果不会再写回
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            self.generation.advance();
            info!("[Poller] {} 已停止", self.name);
        }
    }

    /// 请求一次额外的拉取（例如切换日期），按防抖配置合并连续的触发
    pub fn trigger(&self) -> bool {
        match &self.active {
            Some(active) => active.trigger_tx.send(()).is_ok(),
            None => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        name: String,
        config: PollerConfig,
        generation: u64,
        sequence: Arc<AtomicU64>,
        fetch: FetchFn,
        leading: BoxFuture<'static, ()>,
        mut trigger_rx: mpsc::UnboundedReceiver<()>,
        cancel: CancellationToken,
    ) {
        let next_ticket = || PollTicket {
            generation,
            sequence: sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };

        if !Self::run_fetch(&name, leading, &cancel).await {
            return;
        }

        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !Self::run_fetch(&name, fetch(next_ticket()), &cancel).await {
                        break;
                    }
                }
                Some(()) = trigger_rx.recv() => {
                    if let Some(quiet) = config.debounce {
                        // 静默期内的新触发会重新计时
                        loop {
                            tokio::select! {
                                _ = cancel.cancelled() => return,
                                _ = sleep(quiet) => break,
                                Some(()) = trigger_rx.recv() => continue,
                            }
                        }
                    }
                    debug!("[Poller] {} 手动触发拉取", name);
                    if !Self::run_fetch(&name, fetch(next_ticket()), &cancel).await {
                        break;
                    }
                    // 固定间隔从这次拉取重新计算
                    ticker.reset();
                }
            }
        }
        debug!("[Poller] {} 轮询任务退出", name);
    }

    /// 返回 false 表示周期已被取消
    async fn run_fetch(name: &str, fetch: BoxFuture<'static, ()>, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[Poller] {} 进行中的拉取已中止", name);
                false
            }
            _ = fetch => true,
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn counting_fetch(count: Arc<AtomicUsize>) -> impl Fn(PollTicket) -> futures::future::Ready<()> + Send + Sync + 'static {
        move |_ticket| {
            count.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_stop_fetches_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut poller = Poller::new("test", PollerConfig::fixed(Duration::from_secs(20)));

        poller.start(counting_fetch(count.clone()));
        poller.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_interval_polling() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut poller = Poller::new("test", PollerConfig::fixed(Duration::from_secs(20)));
        poller.start(counting_fetch(count.clone()));

        sleep(Duration::from_millis(19_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        sleep(Duration::from_secs(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_single_timer() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut poller = Poller::new("test", PollerConfig::fixed(Duration::from_secs(10)));
        poller.start(counting_fetch(count.clone()));
        poller.start(counting_fetch(count.clone()));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        sleep(Duration::from_millis(10_500)).await;
        // 只有一个定时任务，第二个周期贡献一次
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_rapid_triggers() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut poller = Poller::new(
            "production",
            PollerConfig::debounced(Duration::from_secs(3), Duration::from_millis(500)),
        );
        poller.start(counting_fetch(count.clone()));

        sleep(Duration::from_millis(1_000)).await;
        for _ in 0..3 {
            assert!(poller.trigger());
            sleep(Duration::from_millis(100)).await;
        }
        // 最后一次触发在 1.2s，静默期结束于 1.7s
        assert_eq!(count.load(Ordering::SeqCst), 1);
        sleep(Duration::from_millis(450)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // 固定间隔从 1.7s 重新计算，下一次在 4.7s
        sleep(Duration::from_millis(2_800)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_in_flight_fetch_and_advances_generation() {
        let completed = Arc::new(AtomicUsize::new(0));
        let tickets = Arc::new(Mutex::new(Vec::new()));
        let mut poller = Poller::new("slow", PollerConfig::fixed(Duration::from_secs(20)));
        let handle = poller.generation();

        let completed_in_fetch = completed.clone();
        let tickets_in_fetch = tickets.clone();
        poller.start(move |ticket| {
            tickets_in_fetch.lock().unwrap().push(ticket);
            let completed = completed_in_fetch.clone();
            async move {
                sleep(Duration::from_secs(5)).await;
                completed.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_secs(1)).await;
        let ticket = tickets.lock().unwrap()[0];
        assert!(handle.is_current(ticket));

        poller.stop();
        assert!(!handle.is_current(ticket));
        sleep(Duration::from_secs(10)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_issued_keeps_cycle_running() {
        let tickets = Arc::new(Mutex::new(Vec::new()));
        let recorded = tickets.clone();
        let mut poller = Poller::new("date", PollerConfig::fixed(Duration::from_secs(3)));
        let handle = poller.generation();
        poller.start(move |ticket| {
            recorded.lock().unwrap().push(ticket);
            futures::future::ready(())
        });

        let leading = tickets.lock().unwrap()[0];
        poller.discard_issued();
        assert!(!handle.is_current(leading));
        assert!(handle.is_current(poller.issue_ticket()));

        sleep(Duration::from_millis(3_100)).await;
        let next = *tickets.lock().unwrap().last().unwrap();
        assert!(next.sequence > leading.sequence);
        assert!(handle.is_current(next));
        assert!(poller.is_running());
        poller.stop();
    }

    #[test]
    fn test_commit_runs_only_for_current_ticket() {
        let mut poller = Poller::new("s", PollerConfig::fixed(Duration::from_secs(1)));
        let handle = poller.generation();
        let ticket = poller.issue_ticket();
        assert_eq!(handle.commit_if_current(ticket, || 1), Some(1));

        poller.generation.advance();
        assert_eq!(handle.commit_if_current(ticket, || 2), None);
        poller.stop();
    }

    #[test]
    fn test_trigger_without_active_cycle() {
        let poller = Poller::new("idle", PollerConfig::fixed(Duration::from_secs(1)));
        assert!(!poller.trigger());
        let first = poller.issue_ticket();
        let second = poller.issue_ticket();
        assert!(second.sequence > first.sequence);
    }
}

/// 生产监控命令行客户端入口
///
/// 登录、查看看板 / 实时报告 / 产量汇总、导出报告

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use monitor_lib::commands::{self, init_app_state, AppState};
use monitor_lib::logging::init_logger;
use monitor_lib::models::{ExportFormat, ReportKind};
use monitor_lib::services::application::{
    CycleOutcome, DashboardView, LiveReportView, MonitoredScreen, ProductionView, ReportRequest,
    ReportSelection, ScreenSnapshot, ScreenSource,
};
use monitor_lib::services::traits::BaseService;
use monitor_lib::utils::time_utils::{format_report_date, parse_report_date, today_local};
use monitor_lib::ConfigManager;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "monitor", version, about = "生产监控看板命令行客户端")]
struct Cli {
    /// 配置文件路径
    #[arg(long, global = true, default_value = "monitor_config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 登录并保存令牌
    Login {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },
    /// 清除令牌
    Logout,
    /// 网络与会话状态
    Status,
    /// 看板
    Dashboard {
        /// 持续刷新直到 Ctrl+C
        #[arg(long)]
        watch: bool,
    },
    /// 单台机器的实时报告
    LiveReport {
        #[arg(long)]
        machine_id: String,
        /// 日期，默认今天（YYYY-MM-DD）
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        watch: bool,
    },
    /// 产量汇总
    Production {
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        watch: bool,
    },
    /// 机器列表
    Machines,
    /// 导出报告
    Export {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long, value_enum, default_value = "pdf")]
        format: FormatArg,
        #[arg(long)]
        date: Option<String>,
        /// 班次明细报告必填
        #[arg(long)]
        machine_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    ShiftWise,
    Summary,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::ShiftWise => ReportKind::ShiftWise,
            KindArg::Summary => ReportKind::Summary,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Pdf,
    Csv,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Csv => ExportFormat::Csv,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut manager = ConfigManager::new(cli.config.clone());
    manager.load().context("加载配置失败")?;
    init_logger(&manager.get_config().logging_config)?;
    manager.validate_config().context("配置校验失败")?;
    let config = manager.get_config().clone();

    let mut state = init_app_state(config).await?;
    let result = run(&state, cli.command).await;
    state.shutdown().await?;

    if state.login_required() {
        eprintln!("会话已失效，请先执行 `monitor login`");
    }
    result
}

async fn run(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Login { user, password } => {
            let profile = commands::login(state, &user, &password).await?;
            println!("已登录: {}", profile.user_name.as_deref().unwrap_or(&user));
        }
        Command::Logout => {
            commands::logout(state).await?;
            println!("已登出");
        }
        Command::Status => {
            let status = commands::system_status(state).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Dashboard { watch } => run_dashboard(state, watch).await?,
        Command::LiveReport { machine_id, date, watch } => {
            let selection = ReportSelection { machine_id, date: resolve_date(date)? };
            let mut screen = state.live_report_screen(selection);
            show(screen.screen_mut(), watch, print_live_report).await?;
        }
        Command::Production { date, watch } => {
            let mut screen = state.production_screen(resolve_date(date)?);
            show(screen.screen_mut(), watch, print_production).await?;
        }
        Command::Machines => {
            for machine in commands::list_machines(state).await? {
                println!("{}\t{}", machine.machine_id, machine.machine_name);
            }
        }
        Command::Export { kind, format, date, machine_id } => {
            let date = resolve_date(date)?;
            let request = match ReportKind::from(kind) {
                ReportKind::ShiftWise => ReportRequest::ShiftWise {
                    machine_id: machine_id.ok_or_else(|| anyhow!("班次明细报告需要 --machine-id"))?,
                    date,
                },
                ReportKind::Summary => ReportRequest::Summary { date },
            };
            let file = commands::export_report(state, request, format.into()).await?;
            println!("报告已导出: {} ({} 字节)", file.path.display(), file.size_bytes);
        }
    }
    Ok(())
}

fn resolve_date(raw: Option<String>) -> Result<String> {
    match raw {
        None => Ok(format_report_date(today_local())),
        Some(raw) => parse_report_date(&raw)
            .map(format_report_date)
            .ok_or_else(|| anyhow!("无效的日期: {}（应为 YYYY-MM-DD）", raw)),
    }
}

/// 单次拉取，或持续轮询直到 Ctrl+C
async fn show<S: ScreenSource>(screen: &mut MonitoredScreen<S>, watch: bool, render: fn(&S::View)) -> Result<()> {
    if watch {
        let printer = spawn_printer(screen.state().subscribe(), render);
        screen.on_focus();
        tokio::signal::ctrl_c().await?;
        screen.on_blur();
        printer.abort();
        return Ok(());
    }

    match screen.refresh_once().await {
        CycleOutcome::Applied => {
            if let Some(view) = screen.state().view() {
                render(&view);
            }
            Ok(())
        }
        CycleOutcome::Emptied | CycleOutcome::Stale => {
            println!("暂无数据");
            Ok(())
        }
        CycleOutcome::AuthRequired => bail!("需要重新登录"),
        CycleOutcome::Offline => bail!("当前没有网络连接"),
        CycleOutcome::Failed(message) => bail!("拉取数据失败: {}", message),
    }
}

/// 看板在 watch 模式下优先跟随推送通道，断开后回到轮询
async fn run_dashboard(state: &AppState, watch: bool) -> Result<()> {
    let mut dashboard = state.dashboard_screen();
    let live = match state.live() {
        Some(live) if watch => live,
        _ => return show(dashboard.screen_mut(), watch, print_dashboard).await,
    };

    let printer = spawn_printer(dashboard.screen().state().subscribe(), print_dashboard);
    dashboard.screen_mut().on_focus();
    let cancel = CancellationToken::new();
    tokio::select! {
        result = dashboard.follow_live(live, cancel.clone()) => {
            result?;
            tokio::signal::ctrl_c().await?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            cancel.cancel();
        }
    }
    dashboard.screen_mut().on_blur();
    printer.abort();
    Ok(())
}

fn spawn_printer<T>(mut rx: watch::Receiver<ScreenSnapshot<T>>, render: fn(&T)) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(at) = snapshot.updated_at {
                println!("--- {} ---", at.format("%H:%M:%S"));
            }
            match snapshot.view {
                Some(view) => render(&view),
                None => println!("暂无数据"),
            }
        }
    })
}

fn band_name<T: std::fmt::Debug>(band: Option<T>) -> String {
    band.map_or_else(|| "-".to_string(), |b| format!("{:?}", b))
}

fn print_dashboard(view: &DashboardView) {
    for group in &view.groups {
        println!("[{}] {}/{}", group.group_name, group.production_count, group.target_production);
        for machine in &group.machines {
            let window = machine
                .latest_shift
                .as_ref()
                .and_then(|s| s.window.as_ref())
                .map(|w| format!(" ({} - {})", w.start_display, w.end_display))
                .unwrap_or_default();
            println!(
                "  {:<20} {:>6}/{:<6} {:<6} {}{}",
                machine.machine_name,
                machine.production_count,
                machine.target_production,
                band_name(machine.band),
                machine.latest_shift_label(),
                window
            );
        }
    }
}

fn print_live_report(view: &LiveReportView) {
    println!(
        "{} {}  当前班次: {}",
        view.machine_name,
        view.date.as_deref().unwrap_or(""),
        view.latest_shift_label
    );
    for shift in &view.shifts {
        println!("  {}", shift.label);
        for row in &shift.rows {
            println!(
                "    {:<22} {:>6} {:>6} {:>6} {}",
                row.label,
                row.production,
                row.target,
                row.difference,
                band_name(row.band)
            );
        }
        println!(
            "    {:<22} {:>6} {:>6} {:>6}",
            "Total", shift.totals.total_production, shift.totals.total_target, shift.totals.total_difference
        );
    }
}

fn print_production(view: &ProductionView) {
    println!("产量汇总 {}  班次: {}", view.date, view.shift_headers.join(", "));
    for group in &view.groups {
        println!("[{}]", group.group_name);
        for machine in &group.machines {
            let cells: Vec<String> = machine
                .per_shift
                .iter()
                .map(|t| format!("{}/{}", t.total_production, t.total_target))
                .collect();
            println!("  {:<20} {}  = {}", machine.machine_name, cells.join("  "), machine.total.total_production);
        }
    }
    println!(
        "Grand Total {}/{} ({})",
        view.grand_total.total_production, view.grand_total.total_target, view.grand_total.total_difference
    );
}

/// 报告下载服务
///
/// 拉取报告数据 → 格式化 → 导出，状态通过 watch 通道对外可见：
/// `Idle → Fetching → Formatting → Exporting(fmt) → Idle`，任一步骤失败经 `Error` 回到 `Idle`

use log::info;
use std::sync::Arc;
use tokio::sync::watch;

use crate::models::{DownloadState, ExportFormat, ReportKind};
use crate::services::application::report_formatter::{render_csv, render_html};
use crate::services::application::session::SessionGate;
use crate::services::domain::report_table::{build_report_table, ReportData};
use crate::services::infrastructure::{
    ExportPayload, ExportedFile, IExportSink, INavigator, IProductionApi, IUserNotifier,
};
use crate::utils::error::{AppError, AppResult};
use crate::{log_export_failure, log_user_operation};

pub const DOWNLOAD_ALERT_TITLE: &str = "Download Failed";

/// 报告下载请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRequest {
    /// 单台机器的班次明细报告
    ShiftWise { machine_id: String, date: String },
    /// 指定日期的产量汇总报告
    Summary { date: String },
}

impl ReportRequest {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportRequest::ShiftWise { .. } => ReportKind::ShiftWise,
            ReportRequest::Summary { .. } => ReportKind::Summary,
        }
    }

    pub fn date(&self) -> &str {
        match self {
            ReportRequest::ShiftWise { date, .. } | ReportRequest::Summary { date } => date,
        }
    }

    /// 导出文件名（不含扩展名）
    pub fn file_name(&self) -> String {
        match self {
            ReportRequest::ShiftWise { machine_id, date } => {
                format!("{}_{}_{}", self.kind().file_stem(), machine_id, date)
            }
            ReportRequest::Summary { date } => format!("{}_{}", self.kind().file_stem(), date),
        }
    }
}

/// 离开作用域时把状态恢复为 Idle
struct IdleOnDrop<'a> {
    state_tx: &'a watch::Sender<DownloadState>,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.state_tx.send_replace(DownloadState::Idle);
    }
}

/// 报告下载服务
pub struct ReportDownloadService {
    api: Arc<dyn IProductionApi>,
    gate: Arc<SessionGate>,
    navigator: Arc<dyn INavigator>,
    sink: Arc<dyn IExportSink>,
    notifier: Arc<dyn IUserNotifier>,
    state_tx: watch::Sender<DownloadState>,
}

impl ReportDownloadService {
    pub fn new(
        api: Arc<dyn IProductionApi>,
        gate: Arc<SessionGate>,
        navigator: Arc<dyn INavigator>,
        sink: Arc<dyn IExportSink>,
        notifier: Arc<dyn IUserNotifier>,
    ) -> Self {
        let (state_tx, _) = watch::channel(DownloadState::Idle);
        Self { api, gate, navigator, sink, notifier, state_tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> DownloadState {
        self.state_tx.borrow().clone()
    }

    /// 下载一份报告
    ///
    /// 同一时间只允许一个下载；已有下载进行中时直接返回验证错误，不改变状态
    pub async fn download(&self, request: ReportRequest, format: ExportFormat) -> AppResult<ExportedFile> {
        let started = self.state_tx.send_if_modified(|state| {
            if state.is_loading() {
                false
            } else {
                *state = DownloadState::Fetching;
                true
            }
        });
        if !started {
            return Err(AppError::validation_error("已有报告正在下载"));
        }
        let _idle = IdleOnDrop { state_tx: &self.state_tx };

        log_user_operation!("下载{}报告: {:?}", format, request);
        let result = self.run(&request, format).await;
        match &result {
            Ok(file) => info!("[ReportDownload] 报告已生成: {:?}", file.path),
            Err(e) => {
                log_export_failure!("{} 报告下载失败: {}", format, e);
                self.state_tx.send_replace(DownloadState::Error(e.to_string()));
                // 离线提示已由会话守卫给出
                if !e.is_network_unavailable() {
                    self.notifier.alert(DOWNLOAD_ALERT_TITLE, &failure_message(e));
                }
            }
        }
        result
    }

    async fn run(&self, request: &ReportRequest, format: ExportFormat) -> AppResult<ExportedFile> {
        // 令牌失效且网络正常时跳转登录页
        let token = self.gate.ensure_session(self.navigator.as_ref()).await?;
        let data = match request {
            ReportRequest::ShiftWise { machine_id, date } => {
                let report = self.api.fetch_machine_report(&token, machine_id, date).await?;
                ReportData::shift_wise(date.as_str(), &[report])
            }
            ReportRequest::Summary { date } => {
                let groups = self.api.fetch_production(&token, date).await?;
                ReportData::summary(date.as_str(), &groups)
            }
        };
        if data.is_empty() {
            return Err(AppError::validation_error(format!("{} 没有可导出的报告数据", request.date())));
        }

        self.state_tx.send_replace(DownloadState::Formatting);
        let table = build_report_table(&data);
        let payload = match format {
            ExportFormat::Csv => ExportPayload::Csv(render_csv(&table)?),
            ExportFormat::Pdf => ExportPayload::Pdf { html: render_html(&table)?, table },
        };

        self.state_tx.send_replace(DownloadState::Exporting(format));
        self.sink.export(&request.file_name(), payload).await
    }
}

fn failure_message(error: &AppError) -> String {
    match error {
        AppError::ValidationError { .. } => "No report data available for the selected date.".to_string(),
        AppError::AuthInvalid { .. } => "Your session has expired. Please log in again.".to_string(),
        _ => "Failed to generate the report. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, LoginResponse, Machine, MachineReport, Shift, TimeSlot};
    use crate::services::application::session::{Session, OFFLINE_ALERT_TITLE};
    use crate::models::Screen;
    use crate::services::infrastructure::{
        MemoryTokenStore, MockIExportSink, MockINetworkMonitor, MockIProductionApi, MockIUserNotifier,
        RecordingNavigator,
    };
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    type StateProbe = Arc<Mutex<Option<watch::Receiver<DownloadState>>>>;

    fn report() -> MachineReport {
        MachineReport {
            machine_id: "M1".into(),
            machine_name: "Press 1".into(),
            date: Some("2024-05-01".into()),
            shifts: vec![Shift {
                shift_no: 1,
                shift_name: None,
                shift_start_time: None,
                slots: vec![TimeSlot::new("06:00 AM", "07:00 AM", 10, 12)],
            }],
        }
    }

    fn exported(format: ExportFormat) -> ExportedFile {
        ExportedFile {
            report_id: "r1".into(),
            format,
            path: PathBuf::from(format!("/tmp/report.{}", format.extension())),
            size_bytes: 1,
            created_at: Utc::now(),
        }
    }

    fn api() -> MockIProductionApi {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().returning(|_| Ok(()));
        api.expect_fetch_machine_report().returning(|_, _, _| Ok(report()));
        api
    }

    async fn service(
        api: MockIProductionApi,
        connected: bool,
        sink: MockIExportSink,
        notifier: MockIUserNotifier,
    ) -> ReportDownloadService {
        service_with_navigator(api, connected, sink, notifier, Arc::new(RecordingNavigator::new())).await
    }

    async fn service_with_navigator(
        api: MockIProductionApi,
        connected: bool,
        sink: MockIExportSink,
        notifier: MockIUserNotifier,
        navigator: Arc<RecordingNavigator>,
    ) -> ReportDownloadService {
        let session = Arc::new(Session::new(Arc::new(MemoryTokenStore::new())));
        session
            .login(&LoginResponse { token: "abc".into(), user_name: None, role: None })
            .await
            .unwrap();
        let mut network = MockINetworkMonitor::new();
        network.expect_is_connected().returning(move || connected);
        let notifier: Arc<dyn IUserNotifier> = Arc::new(notifier);
        let api: Arc<dyn IProductionApi> = Arc::new(api);
        let gate = Arc::new(SessionGate::new(session, api.clone(), Arc::new(network), notifier.clone()));
        ReportDownloadService::new(api, gate, navigator, Arc::new(sink), notifier)
    }

    fn quiet_notifier() -> MockIUserNotifier {
        let mut notifier = MockIUserNotifier::new();
        notifier.expect_alert().never();
        notifier
    }

    #[tokio::test]
    async fn test_csv_download_passes_through_exporting_and_returns_to_idle() {
        let probe: StateProbe = Arc::new(Mutex::new(None));
        let seen = probe.clone();
        let mut sink = MockIExportSink::new();
        sink.expect_export()
            .withf(|name, payload| name == "shift_wise_report_M1_2024-05-01" && payload.format() == ExportFormat::Csv)
            .times(1)
            .returning(move |_, payload| {
                let state = seen.lock().unwrap().as_ref().unwrap().borrow().clone();
                assert_eq!(state, DownloadState::Exporting(ExportFormat::Csv));
                match payload {
                    ExportPayload::Csv(text) => assert!(text.contains("Grand Total,,,10,12,-2")),
                    other => panic!("unexpected payload {:?}", other),
                }
                Ok(exported(ExportFormat::Csv))
            });

        let service = service(api(), true, sink, quiet_notifier()).await;
        *probe.lock().unwrap() = Some(service.subscribe());

        let request = ReportRequest::ShiftWise { machine_id: "M1".into(), date: "2024-05-01".into() };
        let file = assert_ok!(service.download(request, ExportFormat::Csv).await);
        assert_eq!(file.format, ExportFormat::Csv);
        assert_eq!(service.state(), DownloadState::Idle);
    }

    #[tokio::test]
    async fn test_pdf_summary_carries_html_and_table() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().returning(|_| Ok(()));
        api.expect_fetch_production().returning(|_, _| {
            Ok(vec![Group {
                group_id: "g".into(),
                group_name: "Line A".into(),
                machines: vec![Machine {
                    machine_id: "M1".into(),
                    machine_name: "Press 1".into(),
                    shifts: report().shifts,
                    production_count: 10,
                    target_production: 12,
                }],
            }])
        });
        let mut sink = MockIExportSink::new();
        sink.expect_export()
            .withf(|name, _| name == "production_summary_2024-05-01")
            .times(1)
            .returning(|_, payload| {
                match payload {
                    ExportPayload::Pdf { html, table } => {
                        assert!(html.contains("Production Summary Report"));
                        assert_eq!(table.grand_totals().count(), 1);
                    }
                    other => panic!("unexpected payload {:?}", other),
                }
                Ok(exported(ExportFormat::Pdf))
            });

        let service = service(api, true, sink, quiet_notifier()).await;
        let request = ReportRequest::Summary { date: "2024-05-01".into() };
        assert!(service.download(request, ExportFormat::Pdf).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_report_is_rejected_before_export() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().returning(|_| Ok(()));
        api.expect_fetch_production().returning(|_, _| Ok(vec![]));
        let mut sink = MockIExportSink::new();
        sink.expect_export().never();
        let mut notifier = MockIUserNotifier::new();
        notifier
            .expect_alert()
            .withf(|title, _| title == DOWNLOAD_ALERT_TITLE)
            .times(1)
            .return_const(());

        let service = service(api, true, sink, notifier).await;
        let err = service
            .download(ReportRequest::Summary { date: "2024-05-01".into() }, ExportFormat::Csv)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(service.state(), DownloadState::Idle);
    }

    #[tokio::test]
    async fn test_export_failure_goes_through_error_then_idle() {
        let probe: StateProbe = Arc::new(Mutex::new(None));
        let seen = probe.clone();
        let mut sink = MockIExportSink::new();
        sink.expect_export()
            .returning(|_, _| Err(AppError::export_failure("磁盘已满")));
        let mut notifier = MockIUserNotifier::new();
        notifier.expect_alert().times(1).returning(move |_, _| {
            let state = seen.lock().unwrap().as_ref().unwrap().borrow().clone();
            assert!(matches!(state, DownloadState::Error(_)));
        });

        let service = service(api(), true, sink, notifier).await;
        *probe.lock().unwrap() = Some(service.subscribe());

        let request = ReportRequest::ShiftWise { machine_id: "M1".into(), date: "2024-05-01".into() };
        let err = service.download(request, ExportFormat::Pdf).await.unwrap_err();
        assert_eq!(err.error_code(), "EXPORT_FAILURE");
        assert_eq!(service.state(), DownloadState::Idle);
        assert!(!service.state().is_loading());
    }

    #[tokio::test]
    async fn test_second_download_while_loading_is_rejected() {
        let mut sink = MockIExportSink::new();
        sink.expect_export().never();
        let service = service(api(), true, sink, quiet_notifier()).await;
        service.state_tx.send_replace(DownloadState::Formatting);

        let request = ReportRequest::ShiftWise { machine_id: "M1".into(), date: "2024-05-01".into() };
        let err = service.download(request, ExportFormat::Csv).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(service.state(), DownloadState::Formatting);
    }

    #[tokio::test]
    async fn test_offline_download_alerts_once() {
        let mut sink = MockIExportSink::new();
        sink.expect_export().never();
        let mut notifier = MockIUserNotifier::new();
        notifier
            .expect_alert()
            .withf(|title, _| title == OFFLINE_ALERT_TITLE)
            .times(1)
            .return_const(());

        let service = service(MockIProductionApi::new(), false, sink, notifier).await;
        let request = ReportRequest::Summary { date: "2024-05-01".into() };
        let err = service.download(request, ExportFormat::Csv).await.unwrap_err();
        assert!(err.is_network_unavailable());
        assert_eq!(service.state(), DownloadState::Idle);
    }

    #[tokio::test]
    async fn test_rejected_token_while_online_navigates_to_login() {
        let mut api = MockIProductionApi::new();
        api.expect_check_token().returning(|_| Err(AppError::auth_invalid("401")));
        api.expect_fetch_production().never();
        let mut sink = MockIExportSink::new();
        sink.expect_export().never();
        let mut notifier = MockIUserNotifier::new();
        notifier
            .expect_alert()
            .withf(|title, _| title == DOWNLOAD_ALERT_TITLE)
            .times(1)
            .return_const(());
        let navigator = Arc::new(RecordingNavigator::new());

        let service = service_with_navigator(api, true, sink, notifier, navigator.clone()).await;
        let request = ReportRequest::Summary { date: "2024-05-01".into() };
        let err = service.download(request, ExportFormat::Csv).await.unwrap_err();

        assert!(err.is_auth_invalid());
        assert_eq!(navigator.history(), vec![Screen::Login]);
        assert_eq!(service.state(), DownloadState::Idle);
    }

    #[tokio::test]
    async fn test_offline_download_stays_on_current_screen() {
        let mut sink = MockIExportSink::new();
        sink.expect_export().never();
        let mut notifier = MockIUserNotifier::new();
        notifier.expect_alert().times(1).return_const(());
        let navigator = Arc::new(RecordingNavigator::new());

        let service = service_with_navigator(MockIProductionApi::new(), false, sink, notifier, navigator.clone()).await;
        let request = ReportRequest::Summary { date: "2024-05-01".into() };
        assert!(service.download(request, ExportFormat::Pdf).await.is_err());
        assert!(navigator.history().is_empty());
    }
}

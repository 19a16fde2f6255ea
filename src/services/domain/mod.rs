/// 领域服务层模块
/// 包含与界面、网络无关的纯计算逻辑

/// 时段规范化 - timing 字段统一转换为 TimeSlot 序列
pub mod time_slot_normalizer;

/// 响应结构校验 - 接口数据进入领域模型的唯一入口
pub mod response_schema;

/// 班次聚合
pub mod shift_aggregator;

/// 生产效率色带
pub mod efficiency;

/// 报告表格构建
pub mod report_table;

pub use time_slot_normalizer::{normalize_timing, retain_active_shifts, split_label};
pub use response_schema::{parse_groups, parse_login, parse_machine_list, parse_machine_report};
pub use shift_aggregator::{
    aggregate_group, aggregate_shift, aggregate_shifts, latest_shift, latest_shift_label,
    shift_headers, GroupSummary, MachineSummary, NO_SHIFT_LABEL,
};
pub use efficiency::efficiency_band;
pub use report_table::{
    build_report_table, LineKind, ReportData, ReportItem, ReportLine, ReportSection,
    ReportTable, ShiftBlock, SpanCell, GRAND_TOTAL_LABEL,
};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// 班次固定时长（小时）
///
/// 班次结束时间只用于展示，由开始时间加固定时长推出，不来自服务端数据
pub const SHIFT_LENGTH_HOURS: u32 = 8;

/// 接口使用的日期格式
pub const API_DATE_FORMAT: &str = "%Y-%m-%d";

/// 班次起止时间的展示文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftWindow {
    pub start_display: String,
    pub end_display: String,
}

/// 解析服务端返回的班次开始时间
///
/// 支持 RFC3339、`YYYY-MM-DD HH:MM[:SS]`、`YYYY-MM-DDTHH:MM:SS` 以及纯时间 `HH:MM[:SS]`。
/// 带时区偏移的时间戳取其自身时区下的钟面时间。
pub fn parse_shift_start(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local().time());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.time());
        }
    }

    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return Some(t);
        }
    }

    None
}

/// 24小时制转换为12小时制文本，例如 14:00 → `2:00 PM`，0:30 → `12:30 AM`
pub fn format_12_hour(hour: u32, minute: u32) -> String {
    let suffix = if hour % 24 < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display_hour, minute, suffix)
}

/// 根据班次开始时间计算展示用的起止时间
pub fn shift_window(start: NaiveTime) -> ShiftWindow {
    let end_hour = (start.hour() + SHIFT_LENGTH_HOURS) % 24;
    ShiftWindow {
        start_display: format_12_hour(start.hour(), start.minute()),
        end_display: format_12_hour(end_hour, start.minute()),
    }
}

/// 直接从原始字符串计算班次窗口，无法解析时返回 `None`
pub fn shift_window_from_str(raw: &str) -> Option<ShiftWindow> {
    parse_shift_start(raw).map(shift_window)
}

/// 解析命令行或界面传入的报告日期
pub fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), API_DATE_FORMAT).ok()
}

/// 格式化为接口使用的日期字符串
#[inline]
pub fn format_report_date(date: NaiveDate) -> String {
    date.format(API_DATE_FORMAT).to_string()
}

/// 当前本地日期
#[inline]
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

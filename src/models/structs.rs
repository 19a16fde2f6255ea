use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::utils::time_utils::{shift_window_from_str, ShiftWindow};

/// 时段记录（由服务端 timing 映射规范化得到）
///
/// 只在每次拉取后重新计算，不做持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// 时段开始（展示文本，例如 `08:00 AM`）
    pub start_time: String,
    /// 时段结束（展示文本，标签无分隔符时为空）
    pub end_time: String,
    /// 实际产量
    pub production_count: u64,
    /// 目标产量
    pub target_count: u64,
}

impl TimeSlot {
    pub fn new(
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        production_count: u64,
        target_count: u64,
    ) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
            production_count,
            target_count,
        }
    }

    /// 实际产量与目标产量之差，可以为负
    pub fn difference(&self) -> i64 {
        count_difference(self.production_count, self.target_count)
    }

    /// 报告中使用的时段标签
    pub fn label(&self) -> String {
        if self.end_time.is_empty() {
            self.start_time.clone()
        } else {
            format!("{} - {}", self.start_time, self.end_time)
        }
    }
}

/// 两个计数之差，超出 i64 范围时取边界值
pub fn count_difference(production: u64, target: u64) -> i64 {
    let diff = production as i128 - target as i128;
    diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// 班次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    /// 班次序号（每天 1-3 个班次）
    pub shift_no: u32,
    /// 班次名称
    pub shift_name: Option<String>,
    /// 班次开始时间（服务端原始文本）
    pub shift_start_time: Option<String>,
    /// 规范化后的时段，保持服务端给出的顺序
    pub slots: Vec<TimeSlot>,
}

impl Shift {
    /// 班次显示名：优先使用班次名称，否则为 `Shift {序号}`
    pub fn label(&self) -> String {
        match self.shift_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Shift {}", self.shift_no),
        }
    }

    /// 是否有时段数据
    pub fn has_timing(&self) -> bool {
        !self.slots.is_empty()
    }

    /// 班次起止展示时间（固定班次时长）
    pub fn window(&self) -> Option<ShiftWindow> {
        self.shift_start_time.as_deref().and_then(shift_window_from_str)
    }
}

/// 机器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: String,
    pub machine_name: String,
    pub shifts: Vec<Shift>,
    /// 当日累计产量
    pub production_count: u64,
    /// 当日目标产量
    pub target_production: u64,
}

/// 机器组（例如一个车间）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: String,
    pub group_name: String,
    pub machines: Vec<Machine>,
}

/// 机器列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub machine_id: String,
    pub machine_name: String,
}

/// 单台机器报告（单机报告 / 小时报告接口）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineReport {
    pub machine_id: String,
    pub machine_name: String,
    pub date: Option<String>,
    pub shifts: Vec<Shift>,
}

/// 汇总值：产量、目标、差值
///
/// 总是由源数据求和得到，不单独存储
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftTotals {
    pub total_production: u64,
    pub total_target: u64,
    pub total_difference: i64,
}

impl ShiftTotals {
    pub const ZERO: ShiftTotals = ShiftTotals {
        total_production: 0,
        total_target: 0,
        total_difference: 0,
    };

    pub fn from_counts(production: u64, target: u64) -> Self {
        Self {
            total_production: production,
            total_target: target,
            total_difference: count_difference(production, target),
        }
    }

    /// 完成率百分比，目标为 0 时返回 `None`
    pub fn efficiency_percent(&self) -> Option<f64> {
        if self.total_target == 0 {
            None
        } else {
            Some(self.total_production as f64 / self.total_target as f64 * 100.0)
        }
    }
}

impl From<&TimeSlot> for ShiftTotals {
    fn from(slot: &TimeSlot) -> Self {
        ShiftTotals::from_counts(slot.production_count, slot.target_count)
    }
}

impl Add for ShiftTotals {
    type Output = ShiftTotals;

    fn add(self, rhs: ShiftTotals) -> ShiftTotals {
        // 计数饱和相加，差值由相加后的计数重新计算
        ShiftTotals::from_counts(
            self.total_production.saturating_add(rhs.total_production),
            self.total_target.saturating_add(rhs.total_target),
        )
    }
}

impl AddAssign for ShiftTotals {
    fn add_assign(&mut self, rhs: ShiftTotals) {
        *self = *self + rhs;
    }
}

impl Sum for ShiftTotals {
    fn sum<I: Iterator<Item = ShiftTotals>>(iter: I) -> Self {
        iter.fold(ShiftTotals::ZERO, Add::add)
    }
}

/// 登录接口响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// 与令牌一起保存的用户信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_name: Option<String>,
    pub role: Option<String>,
}
